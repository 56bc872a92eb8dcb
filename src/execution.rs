//! The execution environment a semantic test runs against.

use crate::anvil_executor::AnvilExecutor;
use crate::contract_compiler::ContractCompiler;
use crate::types::ExecutionOutput;
use anyhow::{Context, Result};
use ethers::types::U256;
use tracing::{debug, warn};

/// Deploys a program and performs calls against it, one blocking round-trip
/// at a time.
pub trait ExecutionEnvironment {
    fn deploy(&mut self, source: &str, value: U256, constructor_args: &[u8]) -> Result<ExecutionOutput>;

    fn call(&mut self, signature: &str, value: U256, arguments: &[u8]) -> Result<ExecutionOutput>;
}

/// An Anvil node reached over JSON-RPC, with contracts compiled by forge or solc.
pub struct AnvilEnvironment {
    runtime: tokio::runtime::Runtime,
    executor: AnvilExecutor,
    compiler: ContractCompiler,
    contract_name: Option<String>,
}

impl AnvilEnvironment {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start the async runtime")?;
        let executor = runtime.block_on(AnvilExecutor::new(rpc_url))?;

        Ok(Self {
            runtime,
            executor,
            compiler: ContractCompiler::new(),
            contract_name: None,
        })
    }
}

impl ExecutionEnvironment for AnvilEnvironment {
    fn deploy(&mut self, source: &str, value: U256, constructor_args: &[u8]) -> Result<ExecutionOutput> {
        let compiled = self.compiler.compile_source(source)?;
        debug!("Compiled {} ({} bytes)", compiled.name, compiled.bytecode.len());

        if let Some(constructor) = compiled.abi.constructor() {
            if !constructor.inputs.is_empty() && constructor_args.is_empty() {
                warn!(
                    "Constructor of {} expects {} argument(s) but none were given",
                    compiled.name,
                    constructor.inputs.len()
                );
            }
        }

        let executor = &mut self.executor;
        let code = self.runtime.block_on(async {
            let address = executor
                .deploy_contract(&compiled.name, &compiled.bytecode, constructor_args, value)
                .await?;
            let code = executor.get_code(&address).await?;
            Ok::<_, anyhow::Error>(code)
        })?;

        self.contract_name = Some(compiled.name);
        Ok(ExecutionOutput {
            success: !code.is_empty(),
            output: code,
        })
    }

    fn call(&mut self, signature: &str, value: U256, arguments: &[u8]) -> Result<ExecutionOutput> {
        let contract_name = self
            .contract_name
            .as_deref()
            .context("No contract deployed")?;

        let result = self
            .runtime
            .block_on(self.executor.call_method(contract_name, signature, arguments, value))?;
        if let Some(ref error) = result.error {
            debug!("{} failed: {}", signature, error);
        }
        debug!("{} used {} gas", signature, result.gas_used);

        Ok(ExecutionOutput {
            output: result.return_data,
            success: result.success,
        })
    }
}
