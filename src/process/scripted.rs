//! Scripted command runner for tests

use crate::error::DockhandResult;
use crate::process::runner::{CommandOutput, CommandRunner, CommandSpec};
use async_trait::async_trait;
use std::sync::Mutex;

struct Rule {
    program: String,
    args_prefix: Vec<String>,
    output: CommandOutput,
}

/// Records every command and answers from a table of canned outputs.
///
/// The rule with the longest matching argument prefix wins; commands with
/// no matching rule succeed with empty output.
pub(crate) struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(
        mut self,
        program: &str,
        args_prefix: &[&str],
        code: i32,
        stdout: &str,
        stderr: &str,
    ) -> Self {
        self.rules.push(Rule {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(|s| s.to_string()).collect(),
            output: CommandOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        });
        self
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    pub fn was_called(&self, prefix: &str) -> bool {
        self.command_lines().iter().any(|line| line.starts_with(prefix))
    }

    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.command_lines()
            .iter()
            .position(|line| line.starts_with(prefix))
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> DockhandResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());

        let output = self
            .rules
            .iter()
            .filter(|rule| rule.program == spec.program && spec.args.starts_with(&rule.args_prefix))
            .max_by_key(|rule| rule.args_prefix.len())
            .map(|rule| rule.output.clone())
            .unwrap_or(CommandOutput {
                code: Some(0),
                ..Default::default()
            });

        Ok(output)
    }
}
