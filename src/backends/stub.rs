// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test doubles: scripted pipeline nodes and an in-process module backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::loader::{LoadedModule, ModuleBackend, ModuleInitContext, ABI_VERSION};
use crate::registry::NodeFactory;
use crate::tensor::Tensor;
use crate::traits::{ExecutionContext, PipelineNode};

/// Copies inputs to outputs and counts executions and destroys.
#[derive(Debug, Default)]
pub struct CountingNode {
    pub executions: Arc<AtomicUsize>,
    pub destroyed: Arc<AtomicUsize>,
}

impl CountingNode {
    pub fn with_counters(executions: Arc<AtomicUsize>, destroyed: Arc<AtomicUsize>) -> Self {
        Self {
            executions,
            destroyed,
        }
    }
}

#[async_trait]
impl PipelineNode for CountingNode {
    async fn execute(
        &mut self,
        _ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(inputs.to_vec())
    }

    fn destroy(&mut self) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// A node that always fails
#[derive(Debug, Default)]
pub struct FailingNode;

#[async_trait]
impl PipelineNode for FailingNode {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        _inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        Err(RuntimeError::execution(ctx.node, "scripted failure"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Fails its first `failures` attempts, then copies.
#[derive(Debug)]
pub struct FlakyNode {
    remaining_failures: u32,
}

impl FlakyNode {
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: failures,
        }
    }
}

#[async_trait]
impl PipelineNode for FlakyNode {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        if self.remaining_failures > 0 {
            self.remaining_failures -= 1;
            return Err(RuntimeError::execution(
                ctx.node,
                format!("transient failure on attempt {}", ctx.attempt),
            ));
        }
        Ok(inputs.to_vec())
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Sleeps before copying; used to trip timeouts.
#[derive(Debug)]
pub struct SlowNode {
    delay: Duration,
}

impl SlowNode {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PipelineNode for SlowNode {
    async fn execute(
        &mut self,
        _ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        tokio::time::sleep(self.delay).await;
        Ok(inputs.to_vec())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Appends its node name to a shared log on every execution.
#[derive(Debug)]
pub struct RecordingNode {
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingNode {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl PipelineNode for RecordingNode {
    async fn execute(
        &mut self,
        ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        self.log.lock().unwrap().push(ctx.node.to_string());
        Ok(inputs.to_vec())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Copies inputs and counts how many output batches the engine hands back.
#[derive(Debug)]
pub struct ReleaseCountingNode {
    released: Arc<AtomicUsize>,
}

impl ReleaseCountingNode {
    pub fn new(released: Arc<AtomicUsize>) -> Self {
        Self { released }
    }
}

#[async_trait]
impl PipelineNode for ReleaseCountingNode {
    async fn execute(
        &mut self,
        _ctx: &ExecutionContext<'_>,
        inputs: &[Tensor],
    ) -> RuntimeResult<Vec<Tensor>> {
        Ok(inputs.to_vec())
    }

    fn cleanup(&mut self, outputs: Vec<Tensor>) {
        self.released.fetch_add(1, Ordering::SeqCst);
        drop(outputs);
    }

    fn name(&self) -> &'static str {
        "release_counting"
    }
}

/// Factories for "counting", "failing", "flaky" (`payload.failures`) and
/// "slow" (`payload.delay_ms`).
pub fn stub_factories() -> Vec<NodeFactory> {
    vec![
        NodeFactory::new("counting", "Counting stub", |_name, _config| {
            Ok(Box::new(CountingNode::default()) as Box<dyn PipelineNode>)
        }),
        NodeFactory::new("failing", "Failing stub", |_name, _config| {
            Ok(Box::new(FailingNode) as Box<dyn PipelineNode>)
        }),
        NodeFactory::new("flaky", "Flaky stub", |_name, config| {
            let failures = config
                .payload
                .get("failures")
                .and_then(|v| v.as_u64())
                .unwrap_or(1) as u32;
            Ok(Box::new(FlakyNode::new(failures)) as Box<dyn PipelineNode>)
        }),
        NodeFactory::new("slow", "Slow stub", |_name, config| {
            let delay = config
                .payload
                .get("delay_ms")
                .and_then(|v| v.as_u64())
                .unwrap_or(50);
            Ok(Box::new(SlowNode::new(Duration::from_millis(delay))) as Box<dyn PipelineNode>)
        }),
    ]
}

pub fn recording_factory(log: Arc<Mutex<Vec<String>>>) -> NodeFactory {
    NodeFactory::new("recording", "Recording stub", move |_name, _config| {
        Ok(Box::new(RecordingNode::new(log.clone())) as Box<dyn PipelineNode>)
    })
}

pub fn release_counting_factory(released: Arc<AtomicUsize>) -> NodeFactory {
    NodeFactory::new("release_counting", "Release counting stub", move |_name, _config| {
        Ok(Box::new(ReleaseCountingNode::new(released.clone())) as Box<dyn PipelineNode>)
    })
}

type InitHook = Arc<dyn Fn(&mut ModuleInitContext) -> i32 + Send + Sync>;

/// Behavior of one in-process "module" served by [`FakeBackend`].
#[derive(Clone)]
pub struct FakeModuleSpec {
    name: String,
    abi_version: u32,
    has_symbols: bool,
    init: InitHook,
    register: Option<InitHook>,
}

impl FakeModuleSpec {
    /// A well-formed module declaring `name` and registering nothing.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            abi_version: ABI_VERSION,
            has_symbols: true,
            init: Arc::new(|_| 0),
            register: None,
        }
    }

    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut ModuleInitContext) -> i32 + Send + Sync + 'static,
    {
        self.init = Arc::new(init);
        self
    }

    pub fn with_register<F>(mut self, register: F) -> Self
    where
        F: Fn(&mut ModuleInitContext) -> i32 + Send + Sync + 'static,
    {
        self.register = Some(Arc::new(register));
        self
    }

    pub fn with_abi_version(mut self, version: u32) -> Self {
        self.abi_version = version;
        self
    }

    pub fn without_symbols(mut self) -> Self {
        self.has_symbols = false;
        self
    }
}

/// Serves [`FakeModuleSpec`]s keyed by file stem and counts open handles.
///
/// Clones share their counters, so a test can keep one to observe the
/// backend owned by a loader.
#[derive(Clone, Default)]
pub struct FakeBackend {
    modules: HashMap<String, FakeModuleSpec>,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(mut self, stem: &str, spec: FakeModuleSpec) -> Self {
        self.modules.insert(stem.to_string(), spec);
        self
    }

    /// Handles opened over the backend's lifetime.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Handles not yet dropped.
    pub fn live_modules(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn spec_for(&self, path: &Path) -> RuntimeResult<&FakeModuleSpec> {
        path.file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| self.modules.get(stem))
            .ok_or_else(|| RuntimeError::Incompatible {
                path: path.display().to_string(),
                reason: "not a loadable library".to_string(),
            })
    }
}

pub struct FakeModule {
    spec: FakeModuleSpec,
    live: Arc<AtomicUsize>,
}

impl Drop for FakeModule {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ModuleBackend for FakeBackend {
    type Module = FakeModule;

    fn probe(&self, path: &Path) -> RuntimeResult<()> {
        let spec = self.spec_for(path)?;
        if !spec.has_symbols {
            return Err(RuntimeError::Incompatible {
                path: path.display().to_string(),
                reason: "missing required symbol 'plugflow_module_init'".to_string(),
            });
        }
        Ok(())
    }

    fn open(&self, path: &Path) -> RuntimeResult<FakeModule> {
        let spec = self.spec_for(path)?.clone();
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(FakeModule {
            spec,
            live: self.live.clone(),
        })
    }
}

impl LoadedModule for FakeModule {
    fn abi_version(&self) -> u32 {
        self.spec.abi_version
    }

    fn init(&self, ctx: &mut ModuleInitContext) -> i32 {
        ctx.metadata.name = self.spec.name.clone();
        ctx.metadata.version = "0.1.0".to_string();
        (self.spec.init)(ctx)
    }

    fn register(&self, ctx: &mut ModuleInitContext) -> Option<i32> {
        self.spec.register.as_ref().map(|register| register(ctx))
    }
}
