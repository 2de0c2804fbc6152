//! Prompt templates for catalog generation and answer validation.

pub const ANALYST_SYSTEM_PROMPT: &str = "You are a product data analyst expert. Analyze the provided information and generate accurate answers to the questions based on historical data and scraped content.";

pub const VALIDATOR_SYSTEM_PROMPT: &str =
    "You are a data validation expert. Verify the accuracy and consistency of the provided answers.";

/// Build the user prompt for answer generation.
///
/// `historical` is the pretty-printed JSON of the existing rows.
pub fn generation_prompt(historical: &str, content: &str, questions: &[String]) -> String {
    let question_list = questions
        .iter()
        .map(|q| format!("- {}", q))
        .collect::<Vec<_>>()
        .join("\n");
    let answer_shape = questions
        .iter()
        .map(|q| format!("    \"{}\": \"answer\"", q))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        r#"Based on the following historical data and scraped content, answer the questions about this supplier and product.

Historical Data:
{historical}

Scraped Content:
{content}

Questions:
{question_list}

Provide answers in the following JSON format:
{{
{answer_shape}
}}

Ensure answers are:
1. Consistent with historical data patterns
2. Supported by the scraped content
3. Marked as "AI generated"
"#
    )
}

/// Build the user prompt for validating generated answers.
///
/// `responses` is the pretty-printed JSON of the generated answers.
pub fn validation_prompt(responses: &str, questions: &[String]) -> String {
    let question_list = questions.join(", ");

    format!(
        r#"Validate the following AI-generated answers for the fields: {question_list}

Answers:
{responses}

Check for:
1. Logical consistency
2. Format compliance
3. Business rule adherence

Respond in JSON format:
{{
    "is_valid": true,
    "validation_details": {{
        "field_name": {{"valid": true, "issues": []}}
    }}
}}
"#
    )
}
