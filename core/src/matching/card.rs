//! 候选人选择卡片

use serde_json::{json, Value};

use super::matcher::Candidate;

pub const ACTION_SELECT_CANDIDATE: &str = "select_candidate";

/// Interactive card listing candidates, each with a "select" button.
pub fn candidate_card(task_id: &str, candidates: &[Candidate]) -> Value {
    let mut elements = vec![
        json!({
            "tag": "div",
            "text": {"tag": "lark_md", "content": "**系统已为该任务推荐以下最佳人选：**"}
        }),
        json!({"tag": "hr"}),
    ];

    for (idx, c) in candidates.iter().enumerate() {
        let p = &c.person;
        elements.push(json!({
            "tag": "div",
            "fields": [
                short_field(format!("**#{} {}**", idx + 1, p.name)),
                short_field(format!("**匹配度：{}%**", format_number(c.match_score))),
                short_field(format!("技能：{}", p.skill_tags)),
                short_field(format!("可用时间：{}小时/周", format_number(p.hours_available))),
            ]
        }));
        elements.push(json!({
            "tag": "action",
            "actions": [{
                "tag": "button",
                "text": {"tag": "plain_text", "content": "✅ 选TA"},
                "type": "primary",
                "value": {
                    "task_id": task_id,
                    "user_id": p.user_id,
                    "user_name": p.name,
                    "action": ACTION_SELECT_CANDIDATE
                }
            }]
        }));
        if idx + 1 < candidates.len() {
            elements.push(json!({"tag": "hr"}));
        }
    }

    json!({
        "config": {"wide_screen_mode": true},
        "header": {
            "title": {"tag": "plain_text", "content": "🔍 任务匹配结果"},
            "template": "blue"
        },
        "elements": elements
    })
}

fn short_field(content: String) -> Value {
    json!({"is_short": true, "text": {"tag": "lark_md", "content": content}})
}

/// `85` rather than `85.0` for whole numbers.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
