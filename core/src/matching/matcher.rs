//! 候选人匹配与提交评审

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::prompts::{evaluate_prompt, match_prompt, EVALUATE_SYSTEM, MATCH_SYSTEM};
use super::provider::{parse_json, LlmProvider};
use crate::config::MatchWeights;
use crate::task::{Person, Task};

const FULL_TIME_HOURS: f64 = 40.0;
const RECENCY_HALF_DAYS: f64 = 7.0;

pub const REASON_NO_MODEL: &str = "无法连接评估模型";
pub const REASON_UNPARSEABLE: &str = "评估结果解析失败";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub person: Person,
    /// 0-100
    pub match_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub failed_reasons: Vec<String>,
}

impl Evaluation {
    fn failed(reason: &str) -> Self {
        Self {
            score: 0.0,
            failed_reasons: vec![reason.to_string()],
        }
    }

    pub fn passed(&self, pass_score: f64) -> bool {
        self.score >= pass_score
    }
}

/// Rank `persons` for `task`, best first. Falls back to local weighted scoring
/// when no model is configured or its answer cannot be used.
pub async fn match_candidates(
    provider: Option<&dyn LlmProvider>,
    task: &Task,
    persons: &[Person],
    weights: &MatchWeights,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    if persons.is_empty() {
        tracing::warn!(target: "taskbot.llm", "no persons available for matching");
        return Vec::new();
    }

    if let Some(provider) = provider {
        match parse_json(provider, &match_prompt(task, persons), Some(MATCH_SYSTEM)).await {
            Ok(result) => {
                let ranked = join_matches(&result, persons);
                if !ranked.is_empty() {
                    return ranked;
                }
                tracing::warn!(target: "taskbot.llm", provider = provider.name(), "model returned no usable matches");
            }
            Err(e) => {
                tracing::warn!(target: "taskbot.llm", provider = provider.name(), error = %e, "model matching failed");
            }
        }
    }

    tracing::info!(target: "taskbot.llm", "using local weighted matching");
    local_ranking(task, persons, weights, now)
}

/// Accepts `[{user_id, matchScore|score}]` or `{matches|top3: [...]}`.
fn join_matches(result: &Value, persons: &[Person]) -> Vec<Candidate> {
    let items: &[Value] = match result {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => obj
            .get("matches")
            .or_else(|| obj.get("top3"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    let mut ranked: Vec<Candidate> = items
        .iter()
        .filter_map(|item| {
            let user_id = item.get("user_id").and_then(Value::as_str)?;
            let score = item
                .get("matchScore")
                .or_else(|| item.get("score"))
                .and_then(score_value)
                .unwrap_or(0.0);
            let person = persons.iter().find(|p| p.user_id == user_id)?;
            Some(Candidate {
                person: person.clone(),
                match_score: score,
            })
        })
        .collect();
    sort_desc(&mut ranked);
    ranked
}

fn score_value(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn sort_desc(ranked: &mut [Candidate]) {
    ranked.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
}

pub fn local_ranking(
    task: &Task,
    persons: &[Person],
    weights: &MatchWeights,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let mut ranked: Vec<Candidate> = persons
        .iter()
        .map(|p| Candidate {
            person: p.clone(),
            match_score: local_score(task, p, weights, now),
        })
        .collect();
    sort_desc(&mut ranked);
    ranked
}

/// Weighted 0-100 score from skill overlap, weekly hours, performance and
/// how recently the person finished something.
pub fn local_score(task: &Task, person: &Person, w: &MatchWeights, now: DateTime<Utc>) -> f64 {
    let wanted = split_tags(&task.skill_tags);
    let have = split_tags(&person.skill_tags);
    let skill = if wanted.is_empty() {
        1.0
    } else {
        wanted.iter().filter(|t| have.contains(t)).count() as f64 / wanted.len() as f64
    };
    let availability = (person.hours_available / FULL_TIME_HOURS).clamp(0.0, 1.0);
    let performance = (person.performance / 100.0).clamp(0.0, 1.0);
    let recency = person
        .last_done_at
        .map(|ms| {
            let days = (now.timestamp_millis() - ms).max(0) as f64 / 86_400_000.0;
            1.0 / (1.0 + days / RECENCY_HALF_DAYS)
        })
        .unwrap_or(0.0);

    let total = w.skill * skill
        + w.availability * availability
        + w.performance * performance
        + w.recency * recency;
    (total * 1000.0).round() / 10.0
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split([',', '，', '、', ';', '/'])
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Score a submission. Never fails: problems become a zero score with a reason.
pub async fn evaluate_submission(
    provider: Option<&dyn LlmProvider>,
    task: &Task,
    url: &str,
) -> Evaluation {
    let Some(provider) = provider else {
        tracing::error!(target: "taskbot.llm", "no LLM provider configured for evaluation");
        return Evaluation::failed(REASON_NO_MODEL);
    };

    let result = match parse_json(provider, &evaluate_prompt(task, None, url), Some(EVALUATE_SYSTEM)).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(target: "taskbot.llm", provider = provider.name(), error = %e, "evaluation failed");
            return Evaluation::failed(REASON_UNPARSEABLE);
        }
    };

    let score = result.get("score").and_then(score_value).unwrap_or(0.0);
    let failed_reasons = result
        .get("failedReasons")
        .or_else(|| result.get("reasons"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Evaluation {
        score,
        failed_reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn person(id: &str, skills: &str, hours: f64, perf: f64) -> Person {
        Person {
            record_id: format!("rec_{id}"),
            user_id: id.into(),
            name: id.to_uppercase(),
            skill_tags: skills.into(),
            hours_available: hours,
            performance: perf,
            last_done_at: None,
        }
    }

    fn persons() -> Vec<Person> {
        vec![
            person("alice", "Python, FastAPI", 30.0, 85.0),
            person("bob", "React, TypeScript", 20.0, 90.0),
            person("carol", "Rust, Tokio", 40.0, 95.0),
        ]
    }

    fn task() -> Task {
        Task {
            skill_tags: "rust, tokio".into(),
            ..Task::default()
        }
    }

    fn ids(c: &[Candidate]) -> Vec<&str> {
        c.iter().map(|c| c.person.user_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_llm_list_joined_and_sorted() {
        let llm = ScriptedLlm::new([
            r#"[{"user_id":"bob","matchScore":70},{"user_id":"ghost","score":99},{"user_id":"alice","score":"88"}]"#,
        ]);
        let ranked =
            match_candidates(Some(&llm), &task(), &persons(), &MatchWeights::default(), now()).await;
        assert_eq!(ids(&ranked), vec!["alice", "bob"]);
        assert_eq!(ranked[0].match_score, 88.0);
    }

    #[tokio::test]
    async fn test_llm_object_with_top3() {
        let llm = ScriptedLlm::new([r#"{"top3":[{"user_id":"carol","matchScore":95}]}"#]);
        let ranked =
            match_candidates(Some(&llm), &task(), &persons(), &MatchWeights::default(), now()).await;
        assert_eq!(ids(&ranked), vec!["carol"]);
    }

    #[tokio::test]
    async fn test_fallback_when_model_fails() {
        let llm = ScriptedLlm::new(Vec::<String>::new());
        let ranked =
            match_candidates(Some(&llm), &task(), &persons(), &MatchWeights::default(), now()).await;
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].person.user_id, "carol");

        let offline = match_candidates(None, &task(), &persons(), &MatchWeights::default(), now()).await;
        assert_eq!(ids(&offline), ids(&ranked));
    }

    #[test]
    fn test_local_score_components() {
        let w = MatchWeights::default();
        let full = person("x", "rust,TOKIO", 40.0, 100.0);
        let mut recent = full.clone();
        recent.last_done_at = Some(now().timestamp_millis());
        assert_eq!(local_score(&task(), &full, &w, now()), 90.0);
        assert_eq!(local_score(&task(), &recent, &w, now()), 100.0);
        assert_eq!(local_score(&task(), &person("y", "", 0.0, 0.0), &w, now()), 0.0);
    }

    #[tokio::test]
    async fn test_evaluate_reads_score_and_reasons() {
        let llm = ScriptedLlm::new([r#"{"score": 75, "failedReasons": ["缺少测试"]}"#]);
        let eval = evaluate_submission(Some(&llm), &Task::default(), "https://github.com/pr/1").await;
        assert_eq!(
            eval,
            Evaluation {
                score: 75.0,
                failed_reasons: vec!["缺少测试".into()]
            }
        );
        assert!(!eval.passed(80.0));
    }

    #[tokio::test]
    async fn test_evaluate_failures() {
        let eval = evaluate_submission(None, &Task::default(), "u").await;
        assert_eq!(eval.failed_reasons, vec![REASON_NO_MODEL.to_string()]);

        let llm = ScriptedLlm::new(["not json"]);
        let eval = evaluate_submission(Some(&llm), &Task::default(), "u").await;
        assert_eq!(eval.score, 0.0);
        assert_eq!(eval.failed_reasons, vec![REASON_UNPARSEABLE.to_string()]);
    }
}
