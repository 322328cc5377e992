//! Printers: colored human output and JSON.

use std::io::{self, Write};

use owo_colors::OwoColorize;
use serde_json::json;

use crate::{
    error::Error,
    execution::{ExecutionError, ExecutionResult, TargetResult},
};

pub struct HumanPrinter {
    pub color: bool,
}

impl HumanPrinter {
    pub fn render_target(&self, r: &TargetResult) -> String {
        let mut out = String::new();
        let head = if r.ok() {
            format!("Finished on {}:", r.target)
        } else {
            format!("Failed on {}:", r.target)
        };
        match (self.color, r.ok()) {
            (true, true) => out.push_str(&format!("{}\n", head.green())),
            (true, false) => out.push_str(&format!("{}\n", head.red())),
            (false, _) => out.push_str(&format!("{}\n", head)),
        }
        if let Some(msg) = &r.message {
            out.push_str(&format!("  {}\n", msg));
        }
        for line in r.stdout.lines() {
            out.push_str(&format!("  {}\n", line));
        }
        if !r.stderr.is_empty() {
            out.push_str("  STDERR:\n");
            for line in r.stderr.lines() {
                out.push_str(&format!("    {}\n", line));
            }
        }
        out
    }

    pub fn render_result(&self, result: &ExecutionResult) -> String {
        let mut out = String::new();
        for r in &result.results {
            out.push_str(&self.render_target(r));
        }
        let failed = result.failures().count();
        let summary = if failed == 0 {
            format!("Successful on {} target(s)", result.len())
        } else {
            format!("Failed on {} of {} target(s)", failed, result.len())
        };
        out.push_str(&summary);
        out
    }

    pub fn print_result(&self, result: &ExecutionResult) {
        println!("{}", self.render_result(result));
    }

    pub fn print_error(&self, err: &Error) {
        if let Error::Execution(ExecutionError::Failed(result)) = err {
            self.print_result(result);
            return;
        }
        let msg = format!("Error: {}", err);
        if self.color {
            eprintln!("{}", msg.red());
        } else {
            eprintln!("{}", msg);
        }
    }
}

pub struct JsonPrinter;

impl JsonPrinter {
    pub fn render_result(result: &ExecutionResult) -> serde_json::Value {
        json!({ "ok": result.ok(), "items": result.results })
    }

    pub fn render_error(err: &Error) -> serde_json::Value {
        let mut v = json!({
            "ok": false,
            "error": { "kind": err.kind(), "msg": err.to_string() },
        });
        if let Error::Execution(ExecutionError::Failed(result)) = err {
            v["items"] = json!(result.results);
        }
        v
    }

    pub fn print(value: &serde_json::Value) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, value)?;
        writeln!(stdout)
    }
}
