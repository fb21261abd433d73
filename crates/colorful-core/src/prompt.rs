use crate::legend::LegendMeaning;

/// Renders the analysis instructions for one verse and legend.
///
/// The output is deterministic for a given input; the response contract it
/// describes is what [`crate::normalize`] tolerates.
pub fn build_prompt(verse_text: &str, legend: &[LegendMeaning]) -> String {
    let scheme = legend
        .iter()
        .map(|item| format!("- {}: {}", item.label, item.meaning))
        .collect::<Vec<_>>()
        .join("\n");
    let echoed_text = serde_json::Value::String(verse_text.to_string()).to_string();

    let mut prompt = String::new();
    prompt.push_str(
        "You are an expert scripture analyst. Base every decision *only* on the provided \
         scripture text and the meanings supplied in the user's color scheme.\n\n",
    );

    prompt.push_str("Provided Scripture Text:\n---\n");
    prompt.push_str(verse_text);
    prompt.push_str("\n---\n\n");

    prompt.push_str("User's Color Scheme:\n");
    prompt.push_str(&scheme);
    prompt.push_str("\n\n");

    prompt.push_str(
        "Instructions:\n\
         - Identify the single best highlight color for the entire verse that most completely captures the message.\n\
         - Also identify the runner-up color (second best fit). You must always return two colors (top choice first).\n\
         - Only use color labels that appear in the user's color scheme above. Never invent a color.\n\
         - Assign each color a confidence value from 0-100 (integers) that reflects how strongly the verse should be highlighted with that color. The confidences must sum to 100.\n\
         - If no meaningful runner-up exists, set the second confidence to 0 but still explain why it is far less likely.\n\
         - Provide a concise justification for each color that references details from the verse.\n\
         - Provide a short summary of the primary theme (or null when no clear theme exists).\n\n",
    );

    prompt.push_str(
        "Desired Output Format:\n\
         Return only one valid JSON object in exactly this structure (no extra text or markdown fences). \
         Order the analysis array from highest to lowest confidence.\n\n",
    );
    prompt.push_str(&format!(
        "{{\n  \"scriptureText\": {},\n  \"analysis\": [\n    {{\n      \"colorLabel\": \"Most relevant color label\",\n      \"colorMeaning\": \"Meaning from the user scheme\",\n      \"confidence\": 0,\n      \"justification\": \"Explain why the entire verse fits this color.\"\n    }}\n  ],\n  \"primaryThemeReasoning\": \"One-to-two sentence primary theme summary, or null.\"\n}}\n\n",
        echoed_text
    ));

    prompt.push_str(
        "Analyze the scripture according to these rules and return only the JSON object above.",
    );
    prompt
}
