//! Keeps the trigger-word checklist and the free-text prompt in sync. These
//! are heuristic substring edits, not tokenizer-aware transforms: repeated
//! occurrences, punctuation adjacency and overlapping trigger words are
//! accepted sharp edges.

const TEMPLATE_EXAMPLE_PROMPT: &str = "{Your Prompt Here}\n";
const TEMPLATE_SETTINGS: &str = "Negative prompt:
Steps: 20, Sampler: Euler a, CFG scale: 7, Size: 512x512, Clip skip: 1
";

/// The subset of `known_words` contained in the prompt, preserving the
/// `known_words` order; feeds the checklist widget state.
pub fn words_present_in(prompt: &str, known_words: &[String]) -> Vec<String> {
    known_words
        .iter()
        .filter(|word| prompt.contains(word.as_str()))
        .cloned()
        .collect()
}

/// Applies a checklist toggle to the prompt text. Toggling on prepends the
/// word; toggling off removes its first occurrence plus one trailing space.
pub fn apply_toggle(prompt: &str, word: &str, selected: bool) -> String {
    if selected {
        if prompt.contains(word) {
            return prompt.to_string();
        }
        return format!("{word} {prompt}");
    }

    match prompt.find(word) {
        Some(index) => {
            let mut edited = String::with_capacity(prompt.len());
            edited.push_str(&prompt[..index]);
            let mut rest = &prompt[index + word.len()..];
            rest = rest.strip_prefix(' ').unwrap_or(rest);
            edited.push_str(rest);
            edited.trim().to_string()
        }
        None => prompt.to_string(),
    }
}

/// Boilerplate generation settings appended below a prompt, with a
/// placeholder prompt line when the textbox is still empty.
pub fn template_generation_data(include_example_prompt: bool) -> String {
    if include_example_prompt {
        format!("{TEMPLATE_EXAMPLE_PROMPT}{TEMPLATE_SETTINGS}")
    } else {
        TEMPLATE_SETTINGS.to_string()
    }
}

pub fn append_template(generation_data: &str) -> String {
    format!(
        "{generation_data}{}",
        template_generation_data(generation_data.is_empty())
    )
}
