//! 提示词模板

use crate::task::{Person, Task};

pub const MATCH_SYSTEM: &str = "你是智能人才匹配助手，根据任务需求和人员技能进行最佳匹配。";
pub const EVALUATE_SYSTEM: &str = "你是质量评审助手，根据任务验收标准对提交结果进行评分。";
pub const DEFAULT_DEADLINE: &str = "尽快";
pub const DEFAULT_ACCEPTANCE: &str = "按时完成，功能正确";

pub fn match_prompt(task: &Task, persons: &[Person]) -> String {
    let candidates = persons
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let json = serde_json::json!({
                "user_id": p.user_id,
                "name": p.name,
                "skill_tags": p.skill_tags,
                "hours_available": p.hours_available,
                "performance": p.performance,
                "last_done_at": p.last_done_at,
            });
            format!("{}) {}", i + 1, json)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let deadline = if task.deadline.is_empty() {
        DEFAULT_DEADLINE
    } else {
        &task.deadline
    };
    format!(
        "任务需求: {}, 截止: {}, 描述: {}\n候选人列表:\n{}",
        task.skill_tags, deadline, task.description, candidates
    )
}

pub fn evaluate_prompt(task: &Task, acceptance: Option<&str>, url: &str) -> String {
    format!(
        "任务说明 = «{}»\n验收标准 = «{}»\n提交链接 = {}",
        task.description,
        acceptance.unwrap_or(DEFAULT_ACCEPTANCE),
        url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_prompt_lists_candidates() {
        let task = Task {
            skill_tags: "rust".into(),
            description: "写一个服务".into(),
            ..Task::default()
        };
        let persons = vec![
            Person {
                user_id: "ou_1".into(),
                name: "张三".into(),
                ..Person::default()
            },
            Person {
                user_id: "ou_2".into(),
                ..Person::default()
            },
        ];
        let prompt = match_prompt(&task, &persons);
        assert!(prompt.starts_with("任务需求: rust, 截止: 尽快, 描述: 写一个服务\n候选人列表:\n1) {"));
        assert!(prompt.contains("\"name\":\"张三\""));
        assert!(prompt.contains("\n2) {"));
    }

    #[test]
    fn test_evaluate_prompt_default_acceptance() {
        let task = Task {
            description: "d".into(),
            ..Task::default()
        };
        assert_eq!(
            evaluate_prompt(&task, None, "https://x"),
            "任务说明 = «d»\n验收标准 = «按时完成，功能正确»\n提交链接 = https://x"
        );
    }
}
