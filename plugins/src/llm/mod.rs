mod gemini;
mod openai;

pub use gemini::{GeminiProvider, GEMINI_BASE_URL};
pub use openai::{OpenAiCompatProvider, DEEPSEEK_BASE_URL, OPENAI_BASE_URL};
