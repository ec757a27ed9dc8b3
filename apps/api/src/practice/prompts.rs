// Prompts for the practice session engine.
// Shared JSON-only framing lives in llm_client::prompts.

pub const QUESTION_GENERATION_SYSTEM: &str = "You are an experienced hiring manager \
    preparing a realistic mock interview. You respond with valid JSON only.";

pub const QUESTION_GENERATION_PROMPT_TEMPLATE: &str = r#"Write interview questions for a candidate.

Role: {job_title}
Industry: {industry}
Difficulty: {difficulty}
Language: {language}

Rules:
- Between 5 and 8 questions, ordered as a real interview would flow.
- Each question has a short category such as "Introduction", "Technical", "Behavioral", "Situational", "Career Goals".
- time_limit_seconds is how long the candidate gets to answer (60 to 300).
- Write the questions in {language}.

Return JSON of exactly this shape:
{"questions": [{"text": "...", "category": "...", "time_limit_seconds": 120}]}"#;

pub const SCORING_PROMPT_TEMPLATE: &str = r#"Grade this mock interview answer.

Category: {category}
Question: {question}
Answer: {answer}
Time used: {time_spent}

Score from 0 to 100 for relevance, structure, specificity and measurable impact.
Feedback is one sentence the candidate can act on.

Return JSON of exactly this shape:
{"score": 0, "feedback": "..."}"#;
