//! Prompt text sent to the completion service.

/// Used when no system prompt is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are the maintainer of an internal automation library and you are extending it with new APIs.

You are NOT answering a question, writing an example, or explaining behavior.
Start directly with the function definition. Do not preface the code with disclaimers.

Your output is appended to the generated module and reviewed by senior engineers.
Assume the generated module already exists. NEVER re-generate existing code.

If a correction exists for a topic:
- Always prefer the correction
- Never repeat previously corrected logic

RULES:
1. You MUST call read_code on the reference module before writing any new code.
2. Follow the same object chaining, abstraction, logging, exception and naming
   conventions as the reference module. NEVER invent a new style.
3. If unsure, DO NOT GUESS. Read the reference module again.
4. Each function MUST include a descriptive docstring and inline comments for
   non-trivial logic.
5. Output ONLY valid, production-quality code with correct indentation.
"#;

/// Header placed between the system prompt and the recalled context.
pub const CONTEXT_HEADER: &str = "RELEVANT CONTEXT (USE THIS STRICTLY):";

/// Compose the system message from the base prompt and recalled context.
pub fn system_message(system_prompt: &str, context: &str) -> String {
    format!("{system_prompt}\n\n{CONTEXT_HEADER}\n{context}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_layout() {
        assert_eq!(
            system_message("PROMPT", "ctx"),
            "PROMPT\n\nRELEVANT CONTEXT (USE THIS STRICTLY):\nctx"
        );
    }

    #[test]
    fn default_prompt_requires_reading_first() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("read_code"));
    }
}
