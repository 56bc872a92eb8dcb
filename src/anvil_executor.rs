use anyhow::{Context, Result};
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Gas limit attached to every transaction sent to the node.
const GAS_LIMIT: &str = "0x1000000";
const RECEIPT_POLL_ATTEMPTS: u32 = 100;

/// JSON-RPC client for an Anvil node that deploys and calls contracts.
pub struct AnvilExecutor {
    rpc_url: String,
    client: reqwest::Client,
    deployed_contracts: HashMap<String, String>,
    sender: String,
    nonce: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
    id: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcError {
    /// The node ran the call and the EVM reverted or halted.
    fn is_execution_failure(&self) -> bool {
        self.code == 3 || self.code == -32015 || self.message.contains("revert") || self.message.contains("EvmError")
    }

    fn into_anyhow(self) -> anyhow::Error {
        anyhow::anyhow!("RPC error: {} (code: {})", self.message, self.code)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TransactionReceipt {
    #[serde(rename = "contractAddress")]
    contract_address: Option<String>,
    status: Option<String>,
    #[serde(rename = "gasUsed")]
    gas_used: Option<String>,
}

impl TransactionReceipt {
    fn succeeded(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("1"))
    }
}

/// Result of a contract method execution
#[derive(Debug, Clone)]
pub struct MethodExecutionResult {
    pub success: bool,
    pub gas_used: u64,
    pub return_data: Vec<u8>,
    pub error: Option<String>,
}

impl AnvilExecutor {
    pub async fn new(rpc_url: &str) -> Result<Self> {
        debug!("Connecting to Anvil at: {}", rpc_url);

        let client = reqwest::Client::new();
        let sender = Self::find_sender(&client, rpc_url).await?;
        let nonce = Self::get_transaction_count(&client, rpc_url, &sender)
            .await
            .unwrap_or(0);

        debug!("Sending transactions from {} (nonce {})", sender, nonce);

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            client,
            deployed_contracts: HashMap::new(),
            sender,
            nonce,
        })
    }

    /// Send one request and decode the envelope. Only transport and decoding
    /// problems are errors here; JSON-RPC errors stay in the response.
    async fn rpc_request(
        client: &reqwest::Client,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<JsonRpcResponse> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: 1,
        };

        let response = client
            .post(url)
            .json(&request)
            .send()
            .await
            .context("Failed to send RPC request")?;

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .context("Failed to parse RPC response")?;

        Ok(rpc_response)
    }

    async fn rpc_call(
        client: &reqwest::Client,
        url: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let rpc_response = Self::rpc_request(client, url, method, params).await?;

        if let Some(error) = rpc_response.error {
            if method == "eth_sendTransaction"
                && (error.code == -32601 || error.message.contains("not supported") || error.message.contains("method not found"))
            {
                return Err(anyhow::anyhow!(
                    "RPC error: {} (code: {})\n\n\
                    This endpoint does not accept eth_sendTransaction.\n\
                    Start a local node with `anvil` and point --rpc-url at it (default http://localhost:8545).",
                    error.message, error.code
                ));
            }
            return Err(error.into_anyhow());
        }

        if rpc_response.result.is_none() {
            debug!("RPC call to {} returned no result", method);
        }

        rpc_response.result.context("No result in RPC response")
    }

    /// Get transaction count (nonce) for an address
    async fn get_transaction_count(client: &reqwest::Client, url: &str, address: &str) -> Result<u64> {
        let params = json!([address, "pending"]);
        let result = Self::rpc_call(client, url, "eth_getTransactionCount", params).await?;

        let hex_str = result.as_str().context("Invalid nonce format")?;
        parse_quantity(hex_str).context("Failed to parse nonce")
    }

    /// First unlocked account the node reports, else Anvil's default dev account.
    async fn find_sender(client: &reqwest::Client, url: &str) -> Result<String> {
        match Self::rpc_call(client, url, "eth_accounts", json!([])).await {
            Ok(accounts) => {
                if let Some(first) = accounts.as_array().and_then(|a| a.first()).and_then(|a| a.as_str()) {
                    return Ok(first.to_string());
                }
                warn!("Node reported no unlocked accounts, using the default Anvil account");
            }
            Err(e) => {
                warn!("eth_accounts failed ({}), using the default Anvil account", e);
            }
        }
        Ok("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string())
    }

    /// Deploy creation bytecode and return the new contract address.
    pub async fn deploy_contract(
        &mut self,
        contract_name: &str,
        bytecode: &[u8],
        constructor_args: &[u8],
        value: U256,
    ) -> Result<String> {
        debug!("Deploying contract: {}", contract_name);

        let mut deployment_bytecode = bytecode.to_vec();
        deployment_bytecode.extend_from_slice(constructor_args);
        let bytecode_hex = format!("0x{}", hex::encode(&deployment_bytecode));

        let tx_params = json!({
            "from": self.sender,
            "data": bytecode_hex,
            "value": format!("{:#x}", value),
            "nonce": format!("{:#x}", self.nonce),
            "gas": GAS_LIMIT,
        });

        let tx_hash = Self::rpc_call(&self.client, &self.rpc_url, "eth_sendTransaction", json!([tx_params])).await?;
        let tx_hash_str = tx_hash.as_str().context("Invalid transaction hash format")?;

        let receipt = self.wait_for_transaction(tx_hash_str).await?;
        self.nonce += 1;

        if !receipt.succeeded() {
            let revert_reason = self
                .simulate(json!({ "data": bytecode_hex, "from": self.sender }))
                .await;
            return Err(anyhow::anyhow!(
                "Contract deployment failed: Transaction reverted (status: {})\nRevert reason: {}",
                receipt.status.as_deref().unwrap_or("unknown"),
                revert_reason
            ));
        }

        let contract_address = receipt
            .contract_address
            .context("No contract address in receipt - deployment may have failed")?;

        debug!("Contract {} deployed at: {}", contract_name, contract_address);
        self.deployed_contracts
            .insert(contract_name.to_string(), contract_address.clone());

        Ok(contract_address)
    }

    /// Runtime code stored at `address`.
    pub async fn get_code(&self, address: &str) -> Result<Vec<u8>> {
        let result = Self::rpc_call(&self.client, &self.rpc_url, "eth_getCode", json!([address, "latest"])).await?;
        let code = result.as_str().context("Invalid code format")?;
        hex::decode(code.strip_prefix("0x").unwrap_or(code)).context("Failed to decode contract code")
    }

    /// Receipt of `tx_hash`, or `None` while it is still pending.
    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<TransactionReceipt>> {
        let response =
            Self::rpc_request(&self.client, &self.rpc_url, "eth_getTransactionReceipt", json!([tx_hash])).await?;
        if let Some(error) = response.error {
            return Err(error.into_anyhow());
        }
        match response.result {
            Some(value) if !value.is_null() => {
                let receipt = serde_json::from_value(value).context("Failed to parse transaction receipt")?;
                Ok(Some(receipt))
            }
            _ => Ok(None),
        }
    }

    /// Wait for a transaction to be mined
    async fn wait_for_transaction(&self, tx_hash: &str) -> Result<TransactionReceipt> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            if let Some(receipt) = self.get_receipt(tx_hash).await? {
                return Ok(receipt);
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        }
        Err(anyhow::anyhow!(
            "Transaction not mined after {} attempts",
            RECEIPT_POLL_ATTEMPTS
        ))
    }

    /// Call `method_signature` on a deployed contract and commit the transaction.
    ///
    /// The return data comes from an `eth_call` against the pre-transaction
    /// state; success is taken from the mined receipt.
    pub async fn call_method(
        &mut self,
        contract_name: &str,
        method_signature: &str,
        encoded_args: &[u8],
        value: U256,
    ) -> Result<MethodExecutionResult> {
        let contract_address = self
            .deployed_contracts
            .get(contract_name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Contract {} not deployed", contract_name))?;

        debug!(
            "Calling method {} on contract {} at {}",
            method_signature, contract_name, contract_address
        );

        let selector = calculate_selector(method_signature);
        let mut call_data = selector.to_vec();
        call_data.extend_from_slice(encoded_args);
        let call_data_hex = format!("0x{}", hex::encode(&call_data));
        let value_hex = format!("{:#x}", value);

        let return_data = self
            .return_data(json!({
                "from": self.sender,
                "to": contract_address,
                "data": call_data_hex,
                "value": value_hex,
            }))
            .await?;

        let tx_params = json!({
            "from": self.sender,
            "to": contract_address,
            "data": call_data_hex,
            "value": value_hex,
            "nonce": format!("{:#x}", self.nonce),
            "gas": GAS_LIMIT,
        });

        // A reverting call is still mined; its receipt status reports the failure.
        let tx_hash_value =
            Self::rpc_call(&self.client, &self.rpc_url, "eth_sendTransaction", json!([tx_params])).await?;
        let tx_hash = tx_hash_value.as_str().context("Invalid transaction hash")?;

        let receipt = self.wait_for_transaction(tx_hash).await?;
        self.nonce += 1;

        let gas_used = receipt
            .gas_used
            .as_deref()
            .and_then(|g| parse_quantity(g).ok())
            .unwrap_or(0);

        if receipt.succeeded() {
            return Ok(MethodExecutionResult {
                success: true,
                gas_used,
                return_data,
                error: None,
            });
        }

        let revert_reason = self
            .simulate(json!({
                "from": self.sender,
                "to": contract_address,
                "data": call_data_hex,
                "value": value_hex,
            }))
            .await;
        debug!("{} reverted: {}", method_signature, revert_reason);

        Ok(MethodExecutionResult {
            success: false,
            gas_used,
            return_data: Vec::new(),
            error: Some(revert_reason),
        })
    }

    /// Data an `eth_call` returns against the latest state. A call the EVM
    /// rejects yields no data; any other failure is an error.
    async fn return_data(&self, call_params: serde_json::Value) -> Result<Vec<u8>> {
        let response =
            Self::rpc_request(&self.client, &self.rpc_url, "eth_call", json!([call_params, "latest"])).await?;
        if let Some(error) = response.error {
            if error.is_execution_failure() {
                debug!("eth_call rejected: {}", error.message);
                return Ok(Vec::new());
            }
            return Err(error.into_anyhow());
        }
        let data = response
            .result
            .as_ref()
            .and_then(|v| v.as_str())
            .context("Invalid eth_call result format")?;
        hex::decode(data.strip_prefix("0x").unwrap_or(data)).context("Failed to decode eth_call result")
    }

    /// Replay a transaction with `eth_call` to recover its revert reason.
    async fn simulate(&self, call_params: serde_json::Value) -> String {
        match Self::rpc_call(&self.client, &self.rpc_url, "eth_call", json!([call_params, "latest"])).await {
            Ok(_) => "No revert reason available".to_string(),
            Err(e) => clean_revert_reason(&e.to_string()),
        }
    }
}

fn parse_quantity(hex_str: &str) -> Result<u64> {
    let hex_clean = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    Ok(u64::from_str_radix(hex_clean, 16)?)
}

fn clean_revert_reason(message: &str) -> String {
    let flat = message.replace(['\n', '\r'], " ");
    let flat = flat.trim();
    for marker in ["execution reverted:", "RPC error:"] {
        if let Some(reason) = flat.split(marker).nth(1) {
            return reason.trim().to_string();
        }
    }
    flat.to_string()
}

/// Calculate the 4-byte function selector from a method signature
pub fn calculate_selector(signature: &str) -> [u8; 4] {
    use sha3::{Digest, Keccak256};
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_known_signatures() {
        assert_eq!(calculate_selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(calculate_selector("f()"), [0x26, 0x12, 0x1f, 0xf0]);
    }

    #[test]
    fn revert_reason_is_trimmed() {
        assert_eq!(
            clean_revert_reason("RPC error: execution reverted: not owner\n (code: 3)"),
            "not owner  (code: 3)"
        );
        assert_eq!(clean_revert_reason("RPC error: out of gas"), "out of gas");
        assert_eq!(clean_revert_reason("boom"), "boom");
    }

    #[test]
    fn quantities_parse_as_hex() {
        assert_eq!(parse_quantity("0x1a").unwrap(), 26);
        assert_eq!(parse_quantity("ff").unwrap(), 255);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn only_evm_failures_count_as_reverts() {
        let revert = JsonRpcError {
            code: 3,
            message: "execution reverted: not owner".to_string(),
        };
        assert!(revert.is_execution_failure());

        let halted = JsonRpcError {
            code: -32603,
            message: "EvmError: InvalidFEOpcode".to_string(),
        };
        assert!(halted.is_execution_failure());

        let unknown = JsonRpcError {
            code: -32601,
            message: "method not found".to_string(),
        };
        assert!(!unknown.is_execution_failure());
        assert_eq!(unknown.into_anyhow().to_string(), "RPC error: method not found (code: -32601)");
    }

    #[tokio::test]
    async fn unreachable_node_fails_the_call_instead_of_reverting() {
        let mut executor = AnvilExecutor::new("http://127.0.0.1:1").await.unwrap();
        executor
            .deployed_contracts
            .insert("C".to_string(), "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string());

        let err = executor.call_method("C", "f()", &[], U256::zero()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to send RPC request"));
    }

    #[tokio::test]
    async fn unreachable_node_fails_receipt_polling() {
        let executor = AnvilExecutor::new("http://127.0.0.1:1").await.unwrap();
        assert!(executor.get_receipt("0x00").await.is_err());
    }

    #[test]
    fn receipt_status() {
        let receipt: TransactionReceipt =
            serde_json::from_value(json!({ "status": "0x1", "contractAddress": null, "gasUsed": "0x5208" })).unwrap();
        assert!(receipt.succeeded());
        let receipt: TransactionReceipt = serde_json::from_value(json!({ "status": "0x0" })).unwrap();
        assert!(!receipt.succeeded());
    }
}
