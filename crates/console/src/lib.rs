//! # order-console
//!
//! An ABI-driven console for the Order Payment contract. Functions are discovered from the
//! contract's ABI, their inputs are collected through a typed form, and each invocation is routed
//! through a wallet provider as either a read-only call or a signed transaction. Every outcome is
//! appended to an in-memory activity log.

#[macro_use]
extern crate tracing;

pub mod abi;
pub mod activity;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod fmt;
pub mod form;
pub mod gateway;

pub use abi::{AbiCatalog, FunctionDescriptor, Mutability, PrimitiveTypeTag};
pub use activity::{ActivityLog, InvocationOutput, InvocationRecord, LogEntry};
pub use dispatch::{Dispatcher, InvocationKind, InvocationRequest, PaymentPolicy};
pub use form::{FormEngine, FormState, FormValue};
pub use gateway::{ProviderGateway, RpcWallet, Session, WalletProvider};
