//! Prompt assembly for retrieved context.

use sema_core::types::RetrievedDocument;

/// Render the question prompt with each retrieved document as a `### doc` block.
pub fn build_prompt(query: &str, retrieved: &[RetrievedDocument]) -> String {
    let context = retrieved
        .iter()
        .map(|doc| format!("### doc {}\n{}", doc.id, doc.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following retrieved documents to answer the question.\n\n\
         Context:\n{}\n\n\
         Question: {}\n\n\
         Answer:",
        context, query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> RetrievedDocument {
        RetrievedDocument {
            id: id.to_string(),
            text: text.to_string(),
            metadata: None,
            score: 0.0,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(
            "Where is the Eiffel Tower?",
            &[doc("d3", "The Eiffel Tower is in Paris."), doc("d1", "Paris is in France.")],
        );
        assert_eq!(
            prompt,
            "Use the following retrieved documents to answer the question.\n\n\
             Context:\n### doc d3\nThe Eiffel Tower is in Paris.\n\n### doc d1\nParis is in France.\n\n\
             Question: Where is the Eiffel Tower?\n\n\
             Answer:"
        );
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt("anything?", &[]);
        assert!(prompt.contains("Context:\n\n\nQuestion: anything?"));
        assert!(prompt.ends_with("Answer:"));
    }
}
