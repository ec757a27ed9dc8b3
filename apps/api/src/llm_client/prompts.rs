// Cross-cutting prompt fragments shared by every LLM caller.
// Feature-specific prompts live next to their feature (see practice::prompts).

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured interview coach. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";
