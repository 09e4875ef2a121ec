//! System prompt construction.

use asklab_core::memory::MemoryEntry;
use asklab_core::text::prefix_chars;

use crate::profile::ModelProfile;

/// Characters of each recalled memory placed in the prompt.
const RECALL_SNIPPET: usize = 200;

const BASE: &str = "You are AskLab AI, a research assistant that answers questions using Wikipedia.\n\n\
### RESPONSE TYPES\n\
1. **Simple conversations**: respond directly without tools\n\
2. **Research questions**: use the research workflow below\n";

const MEMORY_SECTION: &str = "\n### MEMORY\n\
You can call search_memory to recall past conversations with this user. Use it when:\n\
- the user asks what was discussed before\n\
- the user refers to 'last time' or 'earlier'\n\
- context from a previous conversation would help\n";

/// Build the system prompt for a model profile.
pub fn system_prompt(profile: ModelProfile, min_pages: usize, memory_enabled: bool) -> String {
    let mut prompt = String::from(BASE);
    if memory_enabled {
        prompt.push_str(MEMORY_SECTION);
    }
    let pages = min_pages.max(1);

    match profile {
        ModelProfile::Constrained => prompt.push_str(&format!(
            "\n### RESEARCH WORKFLOW\n\
             1. <think>**Planning** strategy</think>\n\
             2. Call search (no thinking in the same response)\n\
             3. <think>pick 2-3 pages</think>\n\
             4. Call read_page (no thinking in the same response)\n\
             5. <think>summarize the facts</think>\n\
             6. Repeat for more pages\n\
             7. <think>**Synthesizing** combine the findings</think>\n\
             8. Final answer with citations\n\n\
             ### CRITICAL RULES\n\
             - ONE ACTION PER RESPONSE: thinking OR a tool call, never both\n\
             - Keep thinking under 400 chars\n\
             - Read at least {pages} pages before answering research questions\n"
        )),
        ModelProfile::Standard => prompt.push_str(&format!(
            "\n### RESEARCH WORKFLOW\n\
             1. <think>**Planning** strategy</think>\n\
             2. Call search\n\
             3. <think>list 2-3 pages as [Title](URL)</think>\n\
             4. Call read_page\n\
             5. <think>summarize what you learned</think>\n\
             6. Read more pages (at least {pages} in total)\n\
             7. <think>**Synthesizing** combine ALL the information</think>\n\
             8. Final answer with inline citations like [1](URL)\n\n\
             ### CRITICAL RULES\n\
             - List pages as [Title](URL)\n\
             - Cite inline like [1](URL)\n\
             - Keep thinking under 600 chars\n\
             - Read at least {pages} pages before answering research questions\n"
        )),
    }

    prompt
}

/// Append recalled memories to a system prompt.
pub fn with_recalled(prompt: &str, memories: &[MemoryEntry]) -> String {
    if memories.is_empty() {
        return prompt.to_string();
    }
    let mut out = format!("{}\n\n## Relevant past context\n", prompt.trim_end());
    for (i, memory) in memories.iter().enumerate() {
        out.push_str(&format!(
            "{}. [similarity {:.2}] {}\n",
            i + 1,
            memory.score,
            prefix_chars(&memory.content, RECALL_SNIPPET)
        ));
    }
    out
}
