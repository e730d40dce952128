mod card;
mod matcher;
mod prompts;
mod provider;

pub use card::{candidate_card, ACTION_SELECT_CANDIDATE};
pub use matcher::{
    evaluate_submission, local_ranking, local_score, match_candidates, Candidate, Evaluation,
};
pub use prompts::{evaluate_prompt, match_prompt};
pub use provider::{parse_json, strip_json_fence, ChatMessage, LlmProvider};
