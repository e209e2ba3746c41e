pub fn build_extraction_prompt(chunk_text: &str, entity_types: &[&str]) -> String {
    let types = entity_types.join("|");
    format!(
        r#"Extract named entities and relationships between them from the following news text.

INSTRUCTIONS:
1. Identify named entities of these types only: {types}
   (GPE = countries, cities, states; ORG = companies, agencies, institutions; PERSON = people)
2. Extract relationships that the text states between two of those entities
3. Output ONLY valid JSON, nothing else
4. Use the exact schema below

SCHEMA:
{{
  "entities": [
    {{"text": "surface form exactly as written", "type": "{types}"}}
  ],
  "relations": [
    {{"source": "entity text", "relation": "short_verb_phrase", "target": "entity text"}}
  ]
}}

RULES:
- Entity text must be copied verbatim from the text
- Relation source and target must be entity texts listed in "entities"
- Relation names should be short verb phrases: "acquired", "works_for", "located_in", etc.
- Use empty arrays when nothing is found
- Output ONLY the JSON object, no markdown, no explanations

TEXT:
{chunk_text}

JSON OUTPUT:"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_types_and_text() {
        let prompt = build_extraction_prompt("Acme hired Jane.", &["ORG", "PERSON"]);
        assert!(prompt.contains("ORG|PERSON"));
        assert!(prompt.contains("Acme hired Jane."));
    }
}
