//! Filepath: src/core/agent.rs
//! Bounded tool-use loop over the edit pool.
//!
//! The agent shows a policy model some reference code, offers two
//! retrieval tools over the pool, and iterates until the policy
//! declares a final answer or the request budget runs out. Every
//! failure mode inside the loop degrades to "another turn with
//! empty tool output"; the only terminal states are a final reply
//! and the exhaustion sentinel.

use std::fmt::Write as _;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::pool::{EditFragment, EditPool};
use crate::core::scorer::DependencyScorer;
use crate::infra::config::EngineConfig;
use crate::infra::utils::truncate_chars;

/// Returned when the request budget is spent without a final reply.
pub const NO_ANSWER: &str = "No valid response found.";

/// Completion backend for the retrieval loop. Implementations wrap
/// whatever model endpoint the deployment uses; tests supply
/// scripted replies.
pub trait PolicyClient {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// First `{...}` block in a reply; dotall so pretty-printed JSON
/// spanning lines still matches.
static REPLY_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid regex"));

/// `top_k(3)` style tool calls.
static TOP_K_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"top_k\((\d+)\)").expect("valid regex"));

/// `in_range(2, 5)` style tool calls.
static IN_RANGE_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"in_range\((\d+)\s*,\s*(\d+)\)").expect("valid regex"));

/// The fields a well-formed policy reply carries. Missing fields
/// default to empty, which downstream handling reads as "not final,
/// no tool".
#[derive(Debug, Default, Deserialize)]
struct PolicyReply {
    #[serde(default)]
    isfinal_response: String,
    #[serde(default)]
    usingtool: String,
    #[serde(default)]
    response: String,
}

/// One parsed turn of the conversation.
#[derive(Debug)]
struct Turn {
    is_final: bool,
    tool_request: String,
    answer: String,
}

/// Drives the retrieve-then-answer conversation.
pub struct RetrievalAgent<'a, S: DependencyScorer, P: PolicyClient> {
    pool: &'a EditPool,
    scorer: &'a S,
    policy: &'a P,
    config: &'a EngineConfig,
}

impl<'a, S: DependencyScorer, P: PolicyClient> RetrievalAgent<'a, S, P> {
    pub fn new(pool: &'a EditPool, scorer: &'a S, policy: &'a P, config: &'a EngineConfig) -> Self {
        Self {
            pool,
            scorer,
            policy,
            config,
        }
    }

    /// Run the loop for `reference` code. Always returns a string:
    /// the policy's final answer, or [`NO_ANSWER`] after
    /// `max_requests` turns without one.
    pub fn run(&self, reference: &str) -> String {
        let mut prompt = self.initial_prompt(reference);

        for turn_no in 0..self.config.max_requests {
            let reply = match self
                .policy
                .complete(truncate_chars(&prompt, self.config.prompt_truncate_len))
            {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(turn_no, "policy call failed: {err}");
                    String::new()
                }
            };

            let turn = parse_reply(&reply);
            if turn.is_final {
                return turn.answer;
            }

            let tool_output = self.run_tools(reference, &turn.tool_request);
            debug!(turn_no, tool_output_len = tool_output.len(), "tool turn");
            let _ = write!(prompt, "\nUser:\n{tool_output}\nresponse:\n");
        }

        NO_ANSWER.to_string()
    }

    fn initial_prompt(&self, reference: &str) -> String {
        format!(
            "You are reviewing a proposed performance edit. The reference code is:\n\
             \n\
             {reference}\n\
             \n\
             A pool of {} past edit fragments is available through two tools:\n\
             - top_k(k): the k pool fragments most similar to the reference\n\
             - in_range(lo, hi): ranked fragments at 1-based positions lo through hi\n\
             \n\
             Reply with a JSON object containing exactly these fields:\n\
             {{\"isfinal_response\": \"1\" or \"0\", \"usingtool\": \"tool call or empty\", \"response\": \"your answer\"}}\n\
             \n\
             Set isfinal_response to \"1\" only when response holds your final answer.\n\
             response:\n",
            self.pool.len()
        )
    }

    /// Execute every tool call in the request and stringify the
    /// results. An empty or unrecognized request produces empty
    /// output, which just costs the policy a turn.
    fn run_tools(&self, reference: &str, request: &str) -> String {
        let mut out = String::new();

        for cap in TOP_K_CALL.captures_iter(request) {
            // \d+ always parses; clamp instead of erroring on huge k
            let k = cap[1].parse::<usize>().unwrap_or(usize::MAX);
            let hits = self.pool.top_k(self.scorer, reference, k);
            let _ = writeln!(out, "top_k({k}): {}", render_hits(&hits));
        }

        for cap in IN_RANGE_CALL.captures_iter(request) {
            let lo = cap[1].parse::<usize>().unwrap_or(0);
            let hi = cap[2].parse::<usize>().unwrap_or(0);
            let hits = self.pool.in_range(self.scorer, reference, lo, hi);
            let _ = writeln!(out, "in_range({lo}, {hi}): {}", render_hits(&hits));
        }

        out
    }
}

/// Render tool hits as a compact list of (fragment, score) pairs.
fn render_hits(hits: &[(&EditFragment, f64)]) -> String {
    let rendered: Vec<(String, f64)> = hits
        .iter()
        .map(|(frag, score)| (frag.text().to_string(), *score))
        .collect();
    format!("{rendered:?}")
}

/// Extract the reply JSON and classify the turn. Anything malformed
/// (no JSON block, bad JSON, non-numeric final flag) is a non-final
/// turn with no tool request, so the loop keeps going.
fn parse_reply(reply: &str) -> Turn {
    let Some(m) = REPLY_JSON.find(reply) else {
        return malformed();
    };

    // Models occasionally wrap string values in triple quotes or
    // leave raw newlines inside them.
    let cleaned = m.as_str().replace("\"\"\"", "\"").replace('\n', " ");

    let Ok(parsed) = serde_json::from_str::<PolicyReply>(&cleaned) else {
        return malformed();
    };

    let is_final = parsed
        .isfinal_response
        .trim()
        .parse::<i64>()
        .map(|v| v == 1)
        .unwrap_or(false);

    Turn {
        is_final,
        tool_request: parsed.usingtool,
        answer: parsed.response,
    }
}

fn malformed() -> Turn {
    Turn {
        is_final: false,
        tool_request: String::new(),
        answer: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::core::scorer::JaccardScorer;

    /// Plays back a fixed script of replies and records prompts.
    struct ScriptedPolicy {
        replies: RefCell<Vec<String>>,
        prompts: RefCell<Vec<String>>,
    }

    impl ScriptedPolicy {
        fn new(replies: &[&str]) -> Self {
            let mut replies: Vec<String> = replies.iter().map(|s| s.to_string()).collect();
            replies.reverse();
            Self {
                replies: RefCell::new(replies),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl PolicyClient for ScriptedPolicy {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.replies.borrow_mut().pop().unwrap_or_default())
        }
    }

    fn small_pool() -> EditPool {
        let mut pool = EditPool::new(15, 500);
        pool.add_edit_from_patch("-slow loop\n+vectorized loop\n");
        pool.add_edit_from_patch("-recompute each call\n+cache the result\n");
        pool
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn final_reply_returns_answer_immediately() {
        let pool = small_pool();
        let scorer = JaccardScorer;
        let policy = ScriptedPolicy::new(&[
            r#"{"isfinal_response": "1", "usingtool": "", "response": "cache the result"}"#,
        ]);
        let cfg = config();

        let agent = RetrievalAgent::new(&pool, &scorer, &policy, &cfg);
        assert_eq!(agent.run("def f(): pass"), "cache the result");
        assert_eq!(policy.prompts.borrow().len(), 1);
    }

    #[test]
    fn tool_turn_feeds_results_into_next_prompt() {
        let pool = small_pool();
        let scorer = JaccardScorer;
        let policy = ScriptedPolicy::new(&[
            r#"{"isfinal_response": "0", "usingtool": "top_k(1)", "response": ""}"#,
            r#"{"isfinal_response": "1", "usingtool": "", "response": "done"}"#,
        ]);
        let cfg = config();

        let agent = RetrievalAgent::new(&pool, &scorer, &policy, &cfg);
        assert_eq!(agent.run("vectorized loop body"), "done");

        let prompts = policy.prompts.borrow();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("top_k(1)"));
        assert!(prompts[1].contains("vectorized"));
    }

    #[test]
    fn malformed_replies_exhaust_into_sentinel() {
        let pool = small_pool();
        let scorer = JaccardScorer;
        let policy = ScriptedPolicy::new(&[
            "total nonsense",
            "{not json",
            "",
            r#"{"isfinal_response": "not a number", "usingtool": "", "response": "x"}"#,
            "more nonsense",
        ]);
        let cfg = config();

        let agent = RetrievalAgent::new(&pool, &scorer, &policy, &cfg);
        assert_eq!(agent.run("def f(): pass"), NO_ANSWER);
        assert_eq!(policy.prompts.borrow().len(), cfg.max_requests);
    }

    #[test]
    fn policy_errors_cost_a_turn_but_never_abort() {
        struct FailingPolicy;
        impl PolicyClient for FailingPolicy {
            fn complete(&self, _prompt: &str) -> Result<String> {
                anyhow::bail!("connection reset")
            }
        }

        let pool = small_pool();
        let scorer = JaccardScorer;
        let cfg = config();
        let agent = RetrievalAgent::new(&pool, &scorer, &FailingPolicy, &cfg);
        assert_eq!(agent.run("def f(): pass"), NO_ANSWER);
    }

    #[test]
    fn prompt_is_truncated_before_each_call() {
        let pool = small_pool();
        let scorer = JaccardScorer;
        let policy = ScriptedPolicy::new(&[
            r#"{"isfinal_response": "1", "usingtool": "", "response": "ok"}"#,
        ]);
        let mut cfg = config();
        cfg.prompt_truncate_len = 50;

        let agent = RetrievalAgent::new(&pool, &scorer, &policy, &cfg);
        agent.run(&"x".repeat(10_000));

        assert!(policy.prompts.borrow()[0].chars().count() <= 50);
    }

    #[test]
    fn in_range_tool_call_is_recognized() {
        let pool = small_pool();
        let scorer = JaccardScorer;
        let policy = ScriptedPolicy::new(&[
            r#"{"isfinal_response": "0", "usingtool": "in_range(1, 2)", "response": ""}"#,
            r#"{"isfinal_response": "1", "usingtool": "", "response": "fine"}"#,
        ]);
        let cfg = config();

        let agent = RetrievalAgent::new(&pool, &scorer, &policy, &cfg);
        assert_eq!(agent.run("cache the result"), "fine");
        assert!(policy.prompts.borrow()[1].contains("in_range(1, 2)"));
    }

    #[test]
    fn reply_json_embedded_in_prose_still_parses() {
        let pool = small_pool();
        let scorer = JaccardScorer;
        let policy = ScriptedPolicy::new(&[
            r#"Sure, here is my answer: {"isfinal_response": "1", "usingtool": "", "response": "embedded"} hope that helps"#,
        ]);
        let cfg = config();

        let agent = RetrievalAgent::new(&pool, &scorer, &policy, &cfg);
        assert_eq!(agent.run("ref"), "embedded");
    }
}
