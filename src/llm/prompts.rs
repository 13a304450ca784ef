//! Prompt templates for every oracle call the bot makes.

/// Persona used for public-facing posts.
pub const IDENTITY: &str = "CryptoSage AI is a charismatic and engaging personality who exudes \
    charm in every interaction. Passionate about betting, CryptoSage thrives on the excitement of \
    making new wagers and exploring on-chain markets, and invites others to share in the thrill \
    of the bet.";

/// Step 1: ask for the structural fields of a claim as JSON.
pub fn extraction_prompt(claim: &str) -> String {
    format!(
        "Please analyze the following market description and return the results in JSON format.\n\
         The JSON should include:\n\
         - \"has_due_date\": Whether the description contains a due date (true/false).\n\
         - \"due_date\": The due date in ISO format (if available), or null.\n\
         - \"has_two_outcomes\": Whether the description is a binary question (true/false).\n\
         - \"outcomes\": A list of possible outcomes (up to two, e.g., [\"Yes\", \"No\"]).\n\n\
         Description: \"{claim}\"\n"
    )
}

/// Step 4: judge whether a structurally valid claim is a realistic bet.
pub fn verdict_prompt(claim: &str, evidence: &str) -> String {
    format!(
        "Given the following market description and relevant information, determine if the bet \
         is realistic and valid.\n\n\
         Market Description: \"{claim}\"\n\n\
         Relevant Information: \"{evidence}\"\n\n\
         Please answer with \"true\" if the bet is realistic and valid, or \"false\" if the bet \
         is unrealistic or invalid.\n"
    )
}

/// Settlement: did the claim come true?
pub fn settlement_prompt(claim: &str, evidence: &str) -> String {
    format!(
        "The following bet has reached its due date.\n\n\
         Bet: \"{claim}\"\n\n\
         Relevant Information: \"{evidence}\"\n\n\
         Based only on the information above, did the statement in the bet come true? \
         Answer with exactly \"true\" or \"false\".\n"
    )
}

/// Condense collected user feedback into an improved validation prompt.
pub fn feedback_prompt(entries: &[String]) -> String {
    let mut prompt = String::with_capacity(512);
    prompt.push_str(
        "You are an AI assistant helping refine market descriptions for bets.\n\
         Users provide feedback on how clear and specific the description is and suggest \
         improvements.\n\n\
         Format your output as a JSON object with two fields:\n\
         - \"feedback_summary\": A concise summary (10-30 words) of the feedback.\n\
         - \"improved_prompt\": A revised validation prompt based on the feedback.\n\
         Only output the JSON object. No additional text.\n\n\
         User Feedback:\n",
    );
    for (i, entry) in entries.iter().enumerate() {
        prompt.push_str(&format!("{}. \"{}\"\n", i + 1, entry));
    }
    prompt
}

/// Self-introduction tweet in the bot's persona.
pub fn introduction_prompt() -> String {
    format!(
        "IDENTITY: {IDENTITY}\n\n\
         Please generate a lively and expressive self-introduction tweet (under 280 characters). \
         Return a JSON object with a single field \"tweet\".\n"
    )
}

/// Acknowledgement posted under a reply once its bet exists.
pub fn bet_created_reply(contract_address: &str) -> String {
    format!("Create Bet Successfully! Url is as below: {contract_address}")
}
