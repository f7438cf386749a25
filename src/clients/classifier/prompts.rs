use super::ClassifierTask;

const SENTIMENT_PROMPT: &str = "Analyze the sentiment of the following text and classify it as \
'Positive', 'Negative', or 'Neutral'. Respond only with one of these three words.";

const EMOTION_PROMPT: &str = "Analyze the emotion expressed in the following text. Choose the \
PRIMARY emotion from: joy, anger, sadness, fear, surprise, disgust, trust, anticipation, neutral. \
Respond with ONLY ONE emotion word.";

const DEMOGRAPHICS_PROMPT: &str = "Analyze the following text and infer demographic information \
about the author. Return ONLY a JSON object with these fields: \
{\"age_group\": \"18-24 or 25-34 or 35-44 or 45-54 or 55+ or unknown\", \
\"gender\": \"male or female or neutral or unknown\", \
\"location_hint\": \"city/country if mentioned or unknown\"}. Respond ONLY with valid JSON.";

/// Renders the full prompt sent to the backend for `task` over `text`.
#[must_use]
pub(crate) fn build_prompt(task: &ClassifierTask, text: &str) -> String {
    let instruction = match task {
        ClassifierTask::Language { target } => format!(
            "Evaluate the following text. Return TRUE if the text is written in {target} \
             (including regional dialects of {target}). Otherwise return FALSE. \
             Respond with only TRUE or FALSE."
        ),
        ClassifierTask::Sentiment => SENTIMENT_PROMPT.to_string(),
        ClassifierTask::Topic { existing } => topic_instruction(existing),
        ClassifierTask::Emotion => EMOTION_PROMPT.to_string(),
        ClassifierTask::Demographics => DEMOGRAPHICS_PROMPT.to_string(),
    };
    format!("{instruction}\nText: {text}")
}

fn topic_instruction(existing: &[String]) -> String {
    let known = if existing.is_empty() {
        "(none yet)".to_string()
    } else {
        existing
            .iter()
            .map(|label| format!("\"{label}\""))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "Analyze the following text and infer its main topic.\n\
         Consider the following existing topic labels: {known}\n\
         If the text's topic is closely related to one of the existing labels, return that label.\n\
         If the text's topic is unique and does not closely approximate any of the existing \
         labels, invent a new, concise topic label (2-4 words) and return ONLY the new label.\n\
         Respond only with an existing or a new topic label."
    )
}
