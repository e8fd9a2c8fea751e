//! 按配置名称创建命令处理器。

use crate::error::AgentError;
use crate::example::ExampleCommandProcessor;
use crate::host::CommandProcessor;
use std::collections::HashMap;
use std::sync::Arc;

type Constructor = Box<dyn Fn() -> Arc<dyn CommandProcessor> + Send + Sync>;

/// 处理器工厂：配置字符串到构造函数的映射。
#[derive(Default)]
pub struct ProcessorFactory {
    constructors: HashMap<String, Constructor>,
}

impl ProcessorFactory {
    /// 空工厂。
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册内置示例处理器（短名称与完整类名均可用）。
    pub fn with_builtin() -> Self {
        let mut factory = Self::new();
        for name in [
            ExampleCommandProcessor::NAME,
            "com.sitewhere.agent.example.ExampleCommandProcessor",
        ] {
            factory.register(name, || -> Arc<dyn CommandProcessor> {
                Arc::new(ExampleCommandProcessor::new())
            });
        }
        factory
    }

    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Arc<dyn CommandProcessor> + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }

    /// 按名称创建处理器，未注册的名称返回 `UnknownProcessor`。
    pub fn create(&self, name: &str) -> Result<Arc<dyn CommandProcessor>, AgentError> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| AgentError::UnknownProcessor(name.to_string()))
    }

    /// 已注册名称（排序后）。
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
