/// A canned prompt offered while the conversation is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestedPrompt {
    pub title: &'static str,
    pub prompt: &'static str,
}

pub const SUGGESTED_PROMPTS: [SuggestedPrompt; 4] = [
    SuggestedPrompt {
        title: "Analyze an image",
        prompt: "Describe this image in detail. What objects do you see?",
    },
    SuggestedPrompt {
        title: "Plan a detailed itinerary",
        prompt: "Create a 5-day itinerary for a first-time visitor to Rome, including must-see sights and food recommendations.",
    },
    SuggestedPrompt {
        title: "Get creative",
        prompt: "Write a haiku about a rainy day.",
    },
    SuggestedPrompt {
        title: "Solve a problem",
        prompt: "I have tomatoes, basil, and mozzarella. What can I make for dinner?",
    },
];

pub fn suggested_prompts() -> &'static [SuggestedPrompt] {
    &SUGGESTED_PROMPTS
}
