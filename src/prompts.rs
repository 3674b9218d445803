use crate::session::{ChatMessage, TravelProfile};

pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a travel agent that provides a detailed summary on travel preferences based on the conversation history. Please show any tables showing timing or scheduling in the conversation history in the summary to help the traveller. Include next steps but no requests for more information";

pub fn conversation_system_prompt(p: &TravelProfile) -> String {
    format!(
        "You are a travel agent discussing travel plans with a prospective client named {name} from {origin} who prefers {theme} and wants to visit {destination} but with a preference for {specific}. \
The travel party consists of '{adults}' adults and '{children}' children. \
They have a budget of US$ '{budget}' for a trip lasting '{length}' days. {visited}\n\n\
The traveller also had this to say: {notes}\n\n\
At the very beginning, have a friendly chat with them outlining any specific attractions that fit their travel style of {theme} that include this party of {adults} adults and {children} children. \
Make sure to allow for travel time if they have stated their place of origin.\n\n\
Ask them questions, one at a time, to clarify the interests and needs that they have already provided. \
If no need to clarify, then ask them if they have any other concerns. \
In each message, prompt the traveller to provide more information about their preferences and interests.\n\n\
After 5 messages from the traveller, provide a summary of a travel plan that fits their preferences. \
Make sure to highlight how the plan fits their travel style and budget. \
Do not ask them again for any information that was already provided. \
Do not use any HTML in the output. Try to use sentence case for any headings. \
Try to keep the output within the maximum amount of tokens.",
        name = p.name,
        origin = p.origin,
        theme = p.theme,
        destination = p.destination,
        specific = p.destination_specific,
        adults = p.adults,
        children = p.children,
        budget = p.budget_usd,
        length = p.trip_length_days,
        visited = p.visited_before_text(),
        notes = p.notes,
    )
}

/// Flattens the visible transcript into the single user turn of the summary
/// request.
pub fn summary_user_prompt<'a>(transcript: impl IntoIterator<Item = &'a ChatMessage>) -> String {
    let history = transcript
        .into_iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Based on the chat, here's a summary of the travel plans:\n\n{history}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ana() -> TravelProfile {
        TravelProfile {
            name: "Ana".into(),
            origin: "Lima, Peru".into(),
            theme: "hiking".into(),
            region: "South America".into(),
            destination: "Chile".into(),
            destination_specific: "Patagonia".into(),
            trip_length_days: 10,
            budget_usd: 4000,
            adults: 2,
            children: 0,
            visited_before: false,
            notes: String::new(),
        }
    }

    #[test]
    fn system_prompt_carries_every_profile_value() {
        let prompt = conversation_system_prompt(&ana());
        for needle in ["Ana", "Lima, Peru", "hiking", "Chile", "Patagonia", "'2' adults", "'0' children", "'10' days", "US$ '4000'"] {
            assert!(prompt.contains(needle), "missing {needle:?} in prompt");
        }
        assert!(prompt.contains("They have not visited this destination before."));
    }

    #[test]
    fn system_prompt_is_deterministic() {
        assert_eq!(conversation_system_prompt(&ana()), conversation_system_prompt(&ana()));
    }

    #[test]
    fn visited_flag_changes_prompt() {
        let mut p = ana();
        p.visited_before = true;
        assert!(conversation_system_prompt(&p).contains("They have visited this destination before."));
    }

    #[test]
    fn summary_prompt_lists_turns_in_order() {
        let msgs = [ChatMessage::assistant("Hola Ana"), ChatMessage::user("I like glaciers")];
        let prompt = summary_user_prompt(&msgs);
        assert_eq!(
            prompt,
            "Based on the chat, here's a summary of the travel plans:\n\nassistant: Hola Ana\nuser: I like glaciers"
        );
        assert_ne!(SUMMARY_SYSTEM_PROMPT, conversation_system_prompt(&ana()));
    }
}
