//! Turns a selected function and its form state into a contract call or transaction.

use crate::{
    abi::{AbiCatalog, FunctionDescriptor, Mutability},
    activity::{ActivityLog, InvocationOutput, InvocationRecord},
    convert::to_wei,
    error::{DispatchError, GatewayError},
    fmt::outputs_to_json,
    form::{AMOUNT_INPUT, FormState, FormValue},
    gateway::Session,
};
use alloy_dyn_abi::{DynSolType, DynSolValue, FunctionExt, Specifier};
use alloy_primitives::{Address, U256};
use order_console_config::{Config, DEFAULT_EXCHANGE_RATE};
use serde_json::Value;
use std::{str::FromStr, sync::Arc};

/// How a request reaches the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvocationKind {
    /// Read-only `eth_call`.
    View,
    /// Transaction carrying `value` wei.
    Payable { sender: Address, value: U256 },
    /// Transaction without value.
    NonPayable { sender: Address },
}

impl InvocationKind {
    pub fn sender(&self) -> Option<Address> {
        match self {
            Self::View => None,
            Self::Payable { sender, .. } | Self::NonPayable { sender } => Some(*sender),
        }
    }

    pub fn value(&self) -> Option<U256> {
        match self {
            Self::Payable { value, .. } => Some(*value),
            _ => None,
        }
    }
}

/// A fully resolved invocation, ready to execute.
#[derive(Clone, Debug, PartialEq)]
pub struct InvocationRequest {
    pub function: String,
    pub args: Vec<DynSolValue>,
    pub kind: InvocationKind,
}

/// Which function takes payment, and how its value is derived from the form.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentPolicy {
    pub function: String,
    pub amount_input: String,
    pub exchange_rate: f64,
}

impl Default for PaymentPolicy {
    fn default() -> Self {
        Self {
            function: "placeOrderAndProcessPayment".to_string(),
            amount_input: AMOUNT_INPUT.to_string(),
            exchange_rate: DEFAULT_EXCHANGE_RATE,
        }
    }
}

impl PaymentPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            function: config.payment_function.clone(),
            amount_input: config.payment_amount_input.clone(),
            exchange_rate: config.exchange_rate,
        }
    }

    /// The wei attached to a payable call of `function`; zero unless it is the payment function.
    pub fn value_for(&self, function: &str, state: &FormState) -> Result<U256, DispatchError> {
        if function != self.function {
            return Ok(U256::ZERO);
        }
        let amount = match state.get(&self.amount_input) {
            Some(FormValue::Number(amount)) => *amount,
            Some(FormValue::Empty) | None => 0.0,
            Some(other) => {
                return Err(DispatchError::InvalidArgument {
                    name: self.amount_input.clone(),
                    reason: format!("expected a number, got {other:?}"),
                });
            }
        };
        Ok(to_wei(amount, self.exchange_rate)?)
    }
}

/// Executes invocations against a connected [`Session`] and records every outcome.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    catalog: Arc<AbiCatalog>,
    payment: PaymentPolicy,
}

impl Dispatcher {
    pub fn new(catalog: Arc<AbiCatalog>, payment: PaymentPolicy) -> Self {
        Self { catalog, payment }
    }

    pub fn payment(&self) -> &PaymentPolicy {
        &self.payment
    }

    /// Invokes `function` with the values in `state` and appends exactly one record to `log`.
    ///
    /// Failures are reported in the returned output, never as an error.
    pub async fn invoke(
        &self,
        session: Option<&Session>,
        function: &str,
        state: &FormState,
        log: &ActivityLog,
    ) -> InvocationOutput {
        let result = self.try_invoke(session, function, state).await;
        self.record(function, state, result, log)
    }

    /// Appends the outcome of invoking `function` to `log` and returns it as an output.
    pub fn record(
        &self,
        function: &str,
        state: &FormState,
        result: Result<Value, DispatchError>,
        log: &ActivityLog,
    ) -> InvocationOutput {
        let output = match result {
            Ok(response) => {
                debug!(function, "invocation succeeded");
                InvocationOutput::Response(response)
            }
            Err(err) => {
                warn!(function, %err, "invocation failed");
                InvocationOutput::Error(err.to_string())
            }
        };
        log.append(InvocationRecord::new(function, state.clone(), output.clone()));
        output
    }

    async fn try_invoke(
        &self,
        session: Option<&Session>,
        function: &str,
        state: &FormState,
    ) -> Result<Value, DispatchError> {
        let descriptor = self
            .catalog
            .find_function(function)
            .ok_or_else(|| DispatchError::UnknownFunction(function.to_string()))?;
        let session = session
            .ok_or_else(|| GatewayError::ProviderUnavailable("wallet not connected".into()))?;
        let request = self.build_request(session, descriptor, state)?;
        self.execute(session, &request).await
    }

    /// Resolves arguments, sender and value for `function`.
    pub fn build_request(
        &self,
        session: &Session,
        function: &FunctionDescriptor,
        state: &FormState,
    ) -> Result<InvocationRequest, DispatchError> {
        let args = build_args(function, state)?;
        let kind = match function.mutability {
            Mutability::View => InvocationKind::View,
            Mutability::Payable => InvocationKind::Payable {
                sender: session.selected_account().ok_or(DispatchError::NoAccountSelected)?,
                value: self.payment.value_for(&function.name, state)?,
            },
            Mutability::NonPayable => InvocationKind::NonPayable {
                sender: session.selected_account().ok_or(DispatchError::NoAccountSelected)?,
            },
        };
        trace!(function = %function.name, ?kind, "built request");
        Ok(InvocationRequest { function: function.name.clone(), args, kind })
    }

    /// Sends `request` through the session's provider and renders the result as JSON.
    pub async fn execute(
        &self,
        session: &Session,
        request: &InvocationRequest,
    ) -> Result<Value, DispatchError> {
        let contract = session.contract();
        let function = self
            .catalog
            .find_function(&request.function)
            .ok_or_else(|| DispatchError::UnknownFunction(request.function.clone()))?;
        let tx = contract.transaction(contract.encode(function, &request.args)?);

        match request.kind {
            InvocationKind::View => {
                let data = session.provider().call(tx).await?;
                let values = function.abi().abi_decode_output(&data).map_err(|source| {
                    DispatchError::Decode { function: function.name.clone(), source }
                })?;
                Ok(outputs_to_json(function.abi(), &values))
            }
            InvocationKind::Payable { sender, value } => {
                let receipt = session.provider().send(tx.from(sender).value(value)).await?;
                Ok(serde_json::to_value(&receipt)?)
            }
            InvocationKind::NonPayable { sender } => {
                let receipt = session.provider().send(tx.from(sender)).await?;
                Ok(serde_json::to_value(&receipt)?)
            }
        }
    }
}

/// Collects one argument per declared input, in declaration order.
fn build_args(
    function: &FunctionDescriptor,
    state: &FormState,
) -> Result<Vec<DynSolValue>, DispatchError> {
    function
        .abi()
        .inputs
        .iter()
        .map(|param| {
            let ty = param.resolve().map_err(|source| DispatchError::Encode {
                function: function.name.clone(),
                source,
            })?;
            let value = state.get(&param.name).unwrap_or(&FormValue::Empty);
            to_sol_value(&param.name, &ty, value)
        })
        .collect()
}

/// Converts a form value into an ABI value of type `ty`.
///
/// Empty integers, booleans and strings take their zero value. Any other empty input is missing.
pub fn to_sol_value(
    name: &str,
    ty: &DynSolType,
    value: &FormValue,
) -> Result<DynSolValue, DispatchError> {
    let invalid =
        |reason: String| DispatchError::InvalidArgument { name: name.to_string(), reason };

    match (ty, value) {
        (DynSolType::Uint(bits), FormValue::Number(n)) => match uint_from_f64(*n) {
            Some(uint) if uint.bit_len() <= *bits => Ok(DynSolValue::Uint(uint, *bits)),
            Some(_) => Err(invalid(format!("{n} does not fit in uint{bits}"))),
            None => Err(invalid(format!("expected a non-negative integer, got {n}"))),
        },
        (DynSolType::Uint(bits), FormValue::Empty) => Ok(DynSolValue::Uint(U256::ZERO, *bits)),
        (DynSolType::Bool, FormValue::Bool(b)) => Ok(DynSolValue::Bool(*b)),
        (DynSolType::Bool, FormValue::Empty) => Ok(DynSolValue::Bool(false)),
        (DynSolType::Address, FormValue::Address(address)) => Ok(DynSolValue::Address(*address)),
        (DynSolType::String, FormValue::Text(s)) => Ok(DynSolValue::String(s.clone())),
        (DynSolType::String, FormValue::Empty) => Ok(DynSolValue::String(String::new())),
        (_, FormValue::Empty) => Err(DispatchError::MissingArgument(name.to_string())),
        (ty, FormValue::Text(s)) => ty.coerce_str(s).map_err(|err| invalid(err.to_string())),
        (ty, FormValue::Number(n)) => {
            ty.coerce_str(&n.to_string()).map_err(|err| invalid(err.to_string()))
        }
        (ty, FormValue::Bool(b)) => {
            ty.coerce_str(&b.to_string()).map_err(|err| invalid(err.to_string()))
        }
        (ty, FormValue::Address(address)) => {
            ty.coerce_str(&address.to_string()).map_err(|err| invalid(err.to_string()))
        }
    }
}

/// Converts an integral, non-negative float to [`U256`].
pub fn uint_from_f64(n: f64) -> Option<U256> {
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 {
        return None;
    }
    U256::from_str(&format!("{n:.0}")).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        activity::LogEntry,
        form::FormEngine,
        gateway::{
            ProviderGateway, WalletProvider,
            tests::{ALICE, BOB, CONTRACT, MockWallet, catalog, mock_gateway},
        },
    };
    use alloy_dyn_abi::JsonAbiExt;
    use alloy_primitives::{Bytes, TxKind, utils::Unit};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(catalog(), PaymentPolicy::default())
    }

    fn form(function: &str, inputs: &[(&str, &str)]) -> FormState {
        let mut engine = FormEngine::new(catalog());
        engine.select_function(function);
        for (name, raw) in inputs {
            engine.set_input(name, raw);
        }
        engine.state().clone()
    }

    async fn connected(wallet: MockWallet) -> (ProviderGateway, Arc<MockWallet>) {
        let (mut gateway, wallet) = mock_gateway(wallet);
        gateway.connect(&ActivityLog::new()).await.unwrap();
        (gateway, wallet)
    }

    fn invocation(entry: &LogEntry) -> &InvocationRecord {
        match entry {
            LogEntry::Invocation(record) => record,
            other => panic!("expected an invocation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn view_call_decodes_output() {
        let order = catalog().find_function("getOrderById").unwrap().abi().clone();
        let encoded = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(3), 256),
            DynSolValue::Address(ALICE),
            DynSolValue::Uint(U256::from(25), 256),
            DynSolValue::Bool(true),
            DynSolValue::Bool(false),
        ])
        .abi_encode_params();
        let wallet = MockWallet::with_accounts(vec![ALICE]);
        *wallet.call_result.lock() = Some(Ok(Bytes::from(encoded)));
        let (gateway, wallet) = connected(wallet).await;

        let log = ActivityLog::new();
        let state = form("getOrderById", &[("id", "3")]);
        let output = dispatcher().invoke(gateway.session(), "getOrderById", &state, &log).await;

        assert_eq!(
            output,
            InvocationOutput::Response(serde_json::json!({
                "orderId": "3",
                "customer": ALICE.to_checksum(None),
                "total": "25",
                "accepted": true,
                "disputed": false,
            }))
        );

        let calls = wallet.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from, None);
        assert_eq!(calls[0].to, Some(TxKind::Call(CONTRACT)));
        let expected = order.abi_encode_input(&[DynSolValue::Uint(U256::from(3), 256)]).unwrap();
        assert_eq!(calls[0].input.input().map(|b| b.to_vec()), Some(expected));
        assert!(wallet.sends.lock().is_empty());

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        let record = invocation(&entries[0]);
        assert_eq!(record.function, "getOrderById");
        assert_eq!(record.inputs, state);
        assert_eq!(record.output, output);
    }

    #[tokio::test]
    async fn payment_attaches_converted_value() {
        let (gateway, wallet) = connected(MockWallet::with_accounts(vec![ALICE, BOB])).await;
        let log = ActivityLog::new();
        let state = form("placeOrderAndProcessPayment", &[("total", "10")]);

        let session = gateway.session();
        let output =
            dispatcher().invoke(session, "placeOrderAndProcessPayment", &state, &log).await;
        assert!(!output.is_error(), "{output:?}");
        assert_eq!(output.response().unwrap()["status"], serde_json::json!("0x1"));

        let sends = wallet.sends.lock();
        assert_eq!(sends.len(), 1);
        assert_eq!(sends[0].from, Some(ALICE));
        assert_eq!(sends[0].value, Some(U256::from(31_250) * Unit::ETHER.wei()));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn other_transactions_carry_no_value() {
        let (mut gateway, wallet) = connected(MockWallet::with_accounts(vec![ALICE, BOB])).await;
        gateway.session_mut().unwrap().select_account(BOB).unwrap();
        let log = ActivityLog::new();

        let state = form("confirmOrder", &[("orderId", "7")]);
        let output = dispatcher().invoke(gateway.session(), "confirmOrder", &state, &log).await;
        assert!(!output.is_error(), "{output:?}");

        // payable, but not the payment function
        let state = form("processAcceptedOrder", &[("orderIndex", "1")]);
        let output =
            dispatcher().invoke(gateway.session(), "processAcceptedOrder", &state, &log).await;
        assert!(!output.is_error(), "{output:?}");

        let sends = wallet.sends.lock();
        assert_eq!(sends.len(), 2);
        assert_eq!(sends[0].from, Some(BOB));
        assert_eq!(sends[0].value, None);
        assert_eq!(sends[1].value, Some(U256::ZERO));
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn without_wallet_reports_unavailable() {
        let log = ActivityLog::new();
        let state = form("orderIndex", &[]);
        let output = dispatcher().invoke(None, "orderIndex", &state, &log).await;

        let message = output.error().unwrap();
        assert!(message.contains("no wallet provider available"), "{message}");
        assert!(log.last().unwrap().is_error());
    }

    #[tokio::test]
    async fn unknown_function_is_logged() {
        let (gateway, wallet) = connected(MockWallet::with_accounts(vec![ALICE])).await;
        let log = ActivityLog::new();
        let state = FormState::default();
        let output = dispatcher().invoke(gateway.session(), "withdrawAll", &state, &log).await;

        assert_eq!(output, InvocationOutput::Error("unknown function `withdrawAll`".into()));
        assert_eq!(invocation(&log.entries()[0]).function, "withdrawAll");
        assert!(wallet.calls.lock().is_empty());
        assert!(wallet.sends.lock().is_empty());
    }

    #[tokio::test]
    async fn provider_errors_are_logged() {
        let wallet = MockWallet {
            send_error: Some("execution reverted: Not admin".into()),
            ..MockWallet::with_accounts(vec![ALICE])
        };
        let (gateway, _) = connected(wallet).await;
        let log = ActivityLog::new();
        let state = form("removeAcceptedOrders", &[]);

        let output =
            dispatcher().invoke(gateway.session(), "removeAcceptedOrders", &state, &log).await;
        assert!(output.error().unwrap().contains("Not admin"));
        assert!(log.entries()[0].is_error());
    }

    #[tokio::test]
    async fn transactions_need_an_account() {
        let (mut gateway, wallet) = connected(MockWallet::with_accounts(vec![ALICE])).await;
        gateway.session_mut().unwrap().clear_account();
        let log = ActivityLog::new();

        let state = form("confirmOrder", &[("orderId", "1")]);
        let output = dispatcher().invoke(gateway.session(), "confirmOrder", &state, &log).await;
        assert_eq!(output.error(), Some("no account selected"));
        assert!(wallet.sends.lock().is_empty());
    }

    #[tokio::test]
    async fn overlapping_invocations_complete_independently() {
        let (gateway, wallet) = connected(MockWallet::with_accounts(vec![ALICE])).await;
        let dispatcher = dispatcher();
        let log = ActivityLog::new();
        let first = form("confirmOrder", &[("orderId", "1")]);
        let second = form("placeOrderAndProcessPayment", &[("total", "2")]);

        let (a, b) = tokio::join!(
            dispatcher.invoke(gateway.session(), "confirmOrder", &first, &log),
            dispatcher.invoke(gateway.session(), "placeOrderAndProcessPayment", &second, &log),
        );
        assert!(!a.is_error() && !b.is_error());
        assert_eq!(wallet.sends.lock().len(), 2);
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn fractional_total_is_rejected() {
        let (gateway, wallet) = connected(MockWallet::with_accounts(vec![ALICE])).await;
        let log = ActivityLog::new();
        let state = form("placeOrderAndProcessPayment", &[("total", "2.5")]);
        assert_eq!(state.get("total"), Some(&FormValue::Number(2.5)));

        let session = gateway.session().unwrap();
        let function = catalog().find_function("placeOrderAndProcessPayment").unwrap().clone();
        let err = dispatcher().build_request(session, &function, &state).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument { ref name, .. } if name == "total"));

        let session = gateway.session();
        let output =
            dispatcher().invoke(session, "placeOrderAndProcessPayment", &state, &log).await;
        assert!(output.error().unwrap().contains("`total`"), "{output:?}");
        assert_eq!(log.len(), 1);
        assert!(log.entries()[0].is_error());
        assert!(wallet.sends.lock().is_empty());
    }

    #[tokio::test]
    async fn reverting_call_is_logged() {
        let wallet = MockWallet::with_accounts(vec![ALICE]);
        *wallet.call_result.lock() = Some(Err("execution reverted: Order not found".into()));
        let (gateway, wallet) = connected(wallet).await;
        let log = ActivityLog::new();
        let state = form("getOrderById", &[("id", "9")]);

        let output = dispatcher().invoke(gateway.session(), "getOrderById", &state, &log).await;
        assert_eq!(
            output,
            InvocationOutput::Error("execution reverted: Order not found (code 3)".into())
        );
        assert_eq!(wallet.calls.lock().len(), 1);
        assert_eq!(log.len(), 1);
        assert_eq!(invocation(&log.entries()[0]).output, output);
    }

    #[tokio::test]
    async fn undecodable_output_is_logged() {
        // no return data for a function with outputs
        let (gateway, _) = connected(MockWallet::with_accounts(vec![ALICE])).await;
        let session = gateway.session().unwrap();
        let dispatcher = dispatcher();
        let request = InvocationRequest {
            function: "orderIndex".into(),
            args: vec![],
            kind: InvocationKind::View,
        };
        let err = dispatcher.execute(session, &request).await.unwrap_err();
        let DispatchError::Decode { function, .. } = err else {
            panic!("expected a decode error, got {err}")
        };
        assert_eq!(function, "orderIndex");

        let log = ActivityLog::new();
        let state = form("orderIndex", &[]);
        let output = dispatcher.invoke(Some(session), "orderIndex", &state, &log).await;
        assert!(output.error().unwrap().starts_with("failed to decode output of `orderIndex`"));
        assert_eq!(log.len(), 1);
        assert!(log.entries()[0].is_error());
    }

    #[test]
    fn records_failures_from_outside_the_dispatcher() {
        let log = ActivityLog::new();
        let state = form("orderIndex", &[]);
        let output = dispatcher().record(
            "orderIndex",
            &state,
            Err(GatewayError::MissingContractAddress.into()),
            &log,
        );
        assert_eq!(output.error(), Some("no contract address configured; set `contract_address`"));
        assert_eq!(invocation(&log.entries()[0]).function, "orderIndex");
    }

    #[test]
    fn builds_tagged_requests() {
        let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::default());
        let contract = crate::gateway::ContractHandle::new(CONTRACT, catalog());
        let session = Session::new(wallet, vec![ALICE], contract);
        let dispatcher = dispatcher();
        let catalog = catalog();

        let function = catalog.find_function("getUserBalance").unwrap();
        let state = form("getUserBalance", &[("user", &BOB.to_string())]);
        let request = dispatcher.build_request(&session, function, &state).unwrap();
        assert_eq!(request.kind, InvocationKind::View);
        assert_eq!(request.args, [DynSolValue::Address(BOB)]);

        let function = catalog.find_function("resolveDispute").unwrap();
        let state = form("resolveDispute", &[("orderId", "4"), ("refund", "true")]);
        let request = dispatcher.build_request(&session, function, &state).unwrap();
        assert_eq!(request.kind, InvocationKind::NonPayable { sender: ALICE });
        assert_eq!(
            request.args,
            [DynSolValue::Uint(U256::from(4), 256), DynSolValue::Bool(true)]
        );

        let function = catalog.find_function("placeOrderAndProcessPayment").unwrap();
        let state = form("placeOrderAndProcessPayment", &[("total", "1")]);
        let request = dispatcher.build_request(&session, function, &state).unwrap();
        assert_eq!(request.kind.sender(), Some(ALICE));
        assert_eq!(request.kind.value(), Some(U256::from(3_125) * Unit::ETHER.wei()));
    }

    #[test]
    fn rejects_unrepresentable_arguments() {
        let catalog = catalog();
        let wallet: Arc<dyn WalletProvider> = Arc::new(MockWallet::default());
        let session = Session::new(
            wallet,
            vec![ALICE],
            crate::gateway::ContractHandle::new(CONTRACT, catalog.clone()),
        );
        let function = catalog.find_function("confirmOrder").unwrap();

        let state = form("confirmOrder", &[("orderId", "1.5")]);
        let err = dispatcher().build_request(&session, function, &state).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument { .. }), "{err}");

        let state = form("confirmOrder", &[("orderId", "-1")]);
        let err = dispatcher().build_request(&session, function, &state).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgument { .. }), "{err}");

        // hasRole takes a bytes32 and an address, neither has a zero value
        let function = catalog.find_function("hasRole").unwrap();
        let state = FormState::default();
        let err = dispatcher().build_request(&session, function, &state).unwrap_err();
        assert!(matches!(err, DispatchError::MissingArgument(ref name) if name == "role"), "{err}");
    }

    #[test]
    fn coerces_values() {
        assert_eq!(uint_from_f64(3.0), Some(U256::from(3)));
        assert_eq!(uint_from_f64(1e21), Some(U256::from(10u64).pow(U256::from(21))));
        assert_eq!(uint_from_f64(0.5), None);
        assert_eq!(uint_from_f64(f64::NAN), None);
        assert_eq!(uint_from_f64(1e300), None);

        let bytes32 = DynSolType::FixedBytes(32);
        let role = format!("0x{}", "00".repeat(32));
        assert_eq!(
            to_sol_value("role", &bytes32, &FormValue::Text(role)).unwrap(),
            DynSolValue::FixedBytes(Default::default(), 32)
        );
        assert!(to_sol_value("role", &bytes32, &FormValue::Text("nope".into())).is_err());
        assert_eq!(
            to_sol_value("reason", &DynSolType::String, &FormValue::Empty).unwrap(),
            DynSolValue::String(String::new())
        );
        assert!(matches!(
            to_sol_value("n", &DynSolType::Uint(8), &FormValue::Number(256.0)),
            Err(DispatchError::InvalidArgument { .. })
        ));
    }
}
