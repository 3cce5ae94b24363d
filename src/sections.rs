/// Heading marker that opens every section of a generated response.
pub const SECTION_MARKER: &str = "### ";

/// Number of sections the prompt asks the model to produce.
pub const EXPECTED_SECTIONS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Split generated markdown into titled sections, in the order they appear.
///
/// Text before the first marker is dropped. The first line of each chunk is
/// the title and the rest is the body; a chunk without a line break is all
/// title. Input without any marker yields no sections.
pub fn parse_sections(markdown: &str) -> Vec<Section> {
    markdown
        .split(SECTION_MARKER)
        .skip(1)
        .map(|chunk| match chunk.split_once('\n') {
            Some((title, body)) => Section {
                title: title.trim().to_string(),
                body: body.trim().to_string(),
            },
            None => Section {
                title: chunk.trim().to_string(),
                body: String::new(),
            },
        })
        .collect()
}
