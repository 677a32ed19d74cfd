//! Tool router: resolves which tool set owns a call and runs it.
//!
//! Tool sets are consulted in registration order and the first one listing
//! the call's name executes it. Every failure mode (unknown tool, tool
//! error, tool panic) comes back as a result string so the model can react;
//! nothing a tool does aborts the turn.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use forgeloop_core::error::{Error, ToolError};
use forgeloop_core::event::{EventBus, ProgressEvent};
use forgeloop_core::message::ToolCall;
use forgeloop_core::provider::ToolDefinition;
use forgeloop_core::tool::ToolSet;
use futures::FutureExt;
use tracing::{debug, warn};

pub use forgeloop_core::message::combine_results;

/// What one dispatched call produced.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub name: String,
    pub output: String,
    pub success: bool,
    pub duration: Duration,
}

#[derive(Default)]
pub struct ToolRouter {
    sets: Vec<Arc<dyn ToolSet>>,
    events: Option<Arc<EventBus>>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `ToolCallStarted` / `ToolCallFinished` for every dispatched call.
    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Register a tool set after every already-registered one.
    ///
    /// Fails if any of its tool names is already taken.
    pub fn register(&mut self, set: Arc<dyn ToolSet>) -> Result<(), Error> {
        let mut owners = self.owners()?;
        for tool in set.list_tools() {
            if let Some(first) = owners.insert(tool.name.clone(), set.name().to_string()) {
                return Err(ToolError::DuplicateTool {
                    name: tool.name,
                    first,
                    second: set.name().to_string(),
                }
                .into());
            }
        }
        debug!(set = set.name(), "Tool set registered");
        self.sets.push(set);
        Ok(())
    }

    pub fn sets(&self) -> &[Arc<dyn ToolSet>] {
        &self.sets
    }

    /// The union of every set's current tools, in registration order.
    ///
    /// Sets are re-listed on each call, so uniqueness is checked again here.
    pub fn definitions(&self) -> Result<Vec<ToolDefinition>, Error> {
        self.owners()?;
        Ok(self.sets.iter().flat_map(|s| s.list_tools()).collect())
    }

    /// Map from tool name to owning set name, failing on the first collision.
    fn owners(&self) -> Result<HashMap<String, String>, Error> {
        let mut owners: HashMap<String, String> = HashMap::new();
        for set in &self.sets {
            for tool in set.list_tools() {
                if let Some(first) = owners.insert(tool.name.clone(), set.name().to_string()) {
                    return Err(ToolError::DuplicateTool {
                        name: tool.name,
                        first,
                        second: set.name().to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(owners)
    }

    fn owner_of(&self, name: &str) -> Option<&Arc<dyn ToolSet>> {
        self.sets
            .iter()
            .find(|set| set.list_tools().iter().any(|t| t.name == name))
    }

    /// Run one call and return its result text.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        self.run(call).await.output
    }

    /// Run every call in order, one at a time.
    pub async fn dispatch_all(&self, calls: &[ToolCall]) -> Vec<ToolOutcome> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(self.run(call).await);
        }
        outcomes
    }

    async fn run(&self, call: &ToolCall) -> ToolOutcome {
        self.publish(ProgressEvent::ToolCallStarted {
            name: call.name.clone(),
            parameters: serde_json::Value::Object(call.parameters.clone()),
        });

        let started = Instant::now();
        let (output, success) = match self.owner_of(&call.name) {
            None => {
                warn!(tool = %call.name, "Unknown tool requested");
                (format!("Error: Unknown tool \"{}\"", call.name), false)
            }
            Some(set) => {
                let execution = AssertUnwindSafe(set.execute_tool(&call.name, &call.parameters))
                    .catch_unwind()
                    .await;
                match execution {
                    Ok(Ok(output)) => (output, true),
                    Ok(Err(e)) => {
                        warn!(tool = %call.name, set = set.name(), error = %e, "Tool failed");
                        (
                            format!("Error executing {}: {}", call.name, failure_reason(e)),
                            false,
                        )
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        warn!(tool = %call.name, set = set.name(), panic = %message, "Tool panicked");
                        (
                            format!("Error executing {}: tool panicked: {message}", call.name),
                            false,
                        )
                    }
                }
            }
        };
        let duration = started.elapsed();

        self.publish(ProgressEvent::ToolCallFinished {
            name: call.name.clone(),
            success,
            duration_ms: duration.as_millis() as u64,
        });

        ToolOutcome {
            name: call.name.clone(),
            output,
            success,
            duration,
        }
    }

    fn publish(&self, event: ProgressEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}

fn failure_reason(e: ToolError) -> String {
    match e {
        ToolError::ExecutionFailed { reason, .. } => reason,
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};
    use std::sync::Mutex;

    /// A tool set with fixed tool names that records what it executed.
    struct RecordingSet {
        name: &'static str,
        tools: Vec<&'static str>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingSet {
        fn new(name: &'static str, tools: &[&'static str], log: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                tools: tools.to_vec(),
                log,
            }
        }
    }

    #[async_trait]
    impl ToolSet for RecordingSet {
        fn name(&self) -> &str {
            self.name
        }

        fn list_tools(&self) -> Vec<ToolDefinition> {
            self.tools
                .iter()
                .map(|t| ToolDefinition {
                    name: (*t).into(),
                    description: format!("{t} from {}", self.name),
                    parameters: json!({"type": "object"}),
                })
                .collect()
        }

        async fn execute_tool(
            &self,
            name: &str,
            parameters: &Map<String, Value>,
        ) -> Result<String, ToolError> {
            self.log.lock().unwrap().push(format!("{}:{name}", self.name));
            match name {
                "fail" => Err(ToolError::ExecutionFailed {
                    tool_name: name.into(),
                    reason: "disk on fire".into(),
                }),
                "bad_args" => Err(ToolError::InvalidArguments("Missing 'path' argument".into())),
                "explode" => panic!("kaboom"),
                _ => Ok(format!(
                    "{name} ran with {}",
                    Value::Object(parameters.clone())
                )),
            }
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall::from_value(name, json!({"n": 1}))
    }

    fn router_with(sets: Vec<RecordingSet>) -> ToolRouter {
        let mut router = ToolRouter::new();
        for set in sets {
            router.register(Arc::new(set)).unwrap();
        }
        router
    }

    #[tokio::test]
    async fn first_owning_set_executes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router_with(vec![
            RecordingSet::new("files", &["read_file"], log.clone()),
            RecordingSet::new("deploy", &["deploy"], log.clone()),
        ]);

        let output = router.dispatch(&call("deploy")).await;
        assert_eq!(output, r#"deploy ran with {"n":1}"#);
        assert_eq!(*log.lock().unwrap(), vec!["deploy:deploy"]);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_result_string() {
        let router = router_with(vec![RecordingSet::new(
            "files",
            &["read_file"],
            Arc::new(Mutex::new(Vec::new())),
        )]);
        let output = router.dispatch(&call("frobulate")).await;
        assert_eq!(output, "Error: Unknown tool \"frobulate\"");
    }

    #[tokio::test]
    async fn tool_errors_become_result_strings() {
        let router = router_with(vec![RecordingSet::new(
            "ops",
            &["fail", "bad_args"],
            Arc::new(Mutex::new(Vec::new())),
        )]);
        assert_eq!(
            router.dispatch(&call("fail")).await,
            "Error executing fail: disk on fire"
        );
        assert_eq!(
            router.dispatch(&call("bad_args")).await,
            "Error executing bad_args: Invalid tool arguments: Missing 'path' argument"
        );
    }

    #[tokio::test]
    async fn panicking_tool_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router_with(vec![RecordingSet::new(
            "ops",
            &["explode", "ok"],
            log.clone(),
        )]);

        let outcomes = router.dispatch_all(&[call("explode"), call("ok")]).await;
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].success);
        assert_eq!(
            outcomes[0].output,
            "Error executing explode: tool panicked: kaboom"
        );
        assert!(outcomes[1].success);
        assert_eq!(*log.lock().unwrap(), vec!["ops:explode", "ops:ok"]);
    }

    #[tokio::test]
    async fn dispatch_all_keeps_model_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router_with(vec![
            RecordingSet::new("a", &["one", "three"], log.clone()),
            RecordingSet::new("b", &["two"], log.clone()),
        ]);

        let outcomes = router
            .dispatch_all(&[call("three"), call("one"), call("nope"), call("two")])
            .await;
        let names: Vec<_> = outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["three", "one", "nope", "two"]);
        assert_eq!(*log.lock().unwrap(), vec!["a:three", "a:one", "b:two"]);

        let outputs: Vec<String> = outcomes.into_iter().map(|o| o.output).collect();
        let combined = combine_results(&outputs);
        assert!(combined.starts_with("three ran with"));
        assert!(combined.contains("\n\nTool 2 result: one ran with"));
        assert!(combined.contains("\n\nTool 3 result: Error: Unknown tool \"nope\""));
        assert!(combined.contains("\n\nTool 4 result: two ran with"));
    }

    #[test]
    fn duplicate_tool_names_are_rejected() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut router = ToolRouter::new();
        router
            .register(Arc::new(RecordingSet::new("files", &["read_file"], log.clone())))
            .unwrap();
        let err = router
            .register(Arc::new(RecordingSet::new("editor", &["read_file"], log)))
            .unwrap_err();
        match err {
            Error::Tool(ToolError::DuplicateTool {
                name,
                first,
                second,
            }) => {
                assert_eq!(name, "read_file");
                assert_eq!(first, "files");
                assert_eq!(second, "editor");
            }
            other => panic!("Expected DuplicateTool, got: {other:?}"),
        }
        assert_eq!(router.sets().len(), 1);
    }

    #[test]
    fn definitions_are_the_union_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let router = router_with(vec![
            RecordingSet::new("a", &["x", "y"], log.clone()),
            RecordingSet::new("b", &["z"], log),
        ]);
        let names: Vec<String> = router
            .definitions()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn progress_events_bracket_each_call() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let router = router_with(vec![RecordingSet::new(
            "ops",
            &["ok"],
            Arc::new(Mutex::new(Vec::new())),
        )])
        .with_events(bus.clone());

        router.dispatch(&call("ok")).await;

        match rx.try_recv().unwrap().as_ref() {
            ProgressEvent::ToolCallStarted { name, parameters } => {
                assert_eq!(name, "ok");
                assert_eq!(parameters["n"], 1);
            }
            other => panic!("Expected ToolCallStarted, got: {other:?}"),
        }
        match rx.try_recv().unwrap().as_ref() {
            ProgressEvent::ToolCallFinished { name, success, .. } => {
                assert_eq!(name, "ok");
                assert!(success);
            }
            other => panic!("Expected ToolCallFinished, got: {other:?}"),
        }
    }
}
