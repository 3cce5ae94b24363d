use serde::Serialize;

use crate::error::Error;

/// Budget sent with the request when deep thinking is enabled.
pub const THINKING_BUDGET: u32 = 32_768;

const TEMPLATE: &str = r#"
Act as a super creative, world-class Email Deliverability Architect, A/B Testing Content Specialist, and master direct response copywriter. I need you to think outside the box and generate truly unique and compelling copy.

I will strictly adhere to the following principles:

Sender Name: MUST be exactly two distinct words that are highly relevant to the core offer or benefit. This 2-word phrase must be creative, impactful, and followed by the brand/domain name. Avoid generic terms.
Subject Line: Intrigue/curiosity-driven, not sales-driven, max 50 chars, no spam words.
Content: Conversational, American market tone, AIDA structure, human-focused benefits, and under 150 words.
Spam-Proofing: Zero risky terms, excessive punctuation, or capitalization.

Your Structured Output MUST be in Markdown format as specified below:

### 1️⃣ Expert Technical & Content Analysis
| Section | Diagnosis |
|---|---|
| Spam Trigger Diagnosis | [List of risky/banned terms found or "None found."] |
| Technical Health Check | [Evaluation of image-to-text ratio, HTML bloat, link density.] |
| ISP Policy Red Flags | [Identification of deceptive urgency, hype, or domain inconsistency.] |
| A-to-B Gap Analysis | [Feature-to-Benefit transformation analysis.] |
| Clarity & Tone Audit | [Assessment of tone for American audience: conversational vs. corporate.] |

### 2️⃣ The Optimized Email Version
| Element | Optimization Goal | Output |
|---|---|---|
| Sender Name | Generate a primary sender name and 2 strong alternatives. Each must be exactly 2 distinct, offer-relevant words + Brand/Domain. | **Primary:** [Primary Suggestion]<br>*Rationale:* [Brief explanation of why it's strong]<br><br>**Alternatives:**<br>1. [Alternative 1]<br>2. [Alternative 2] |
| Subject Line (Primary) | Max 50 chars, 5–7 words. Intrigue/Curiosity-driven | [New Subject Line] |
| Preheader/Snippet | Reinforce SL, context/curiosity hook | [Optimized Preheader] |
| Body Copy | ≤150 words, 3–5 paras, AIDA, human-benefit focus | [Optimized Body Copy] |
| Call-to-Action (CTA) | Suggest 2-3 distinct, benefit-oriented options. | 1. [CTA Option 1 + Placeholder Link]<br>2. [CTA Option 2 + Placeholder Link]<br>3. [CTA Option 3 + Placeholder Link] |
| Closing & Signature | Conversational, warm sign-off from a real name | [Optimized Closing] |

### 3️⃣ Final Deliverability & Accessibility Checklist
- ✅ Mobile-First Scannability: Met
- ✅ Accessibility (A11Y) Ready: Met
- ✅ Spam-Proofing: Met
- ✅ Clear Value in 2 Sentences: Met

---
Here is the webpage content to analyze:

"#;

/// A validated generation request. The content is trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    content: String,
    thinking_enabled: bool,
}

impl GenerationRequest {
    pub fn new(raw: &str, thinking_enabled: bool) -> Result<Self, Error> {
        let content = raw.trim();
        if content.is_empty() {
            return Err(Error::EmptyContent);
        }

        Ok(Self {
            content: content.to_string(),
            thinking_enabled,
        })
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn thinking_enabled(&self) -> bool {
        self.thinking_enabled
    }
}

/// Serialized as the `generationConfig` object of the request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

/// Build the prompt text and the request configuration for one generation.
pub fn build_prompt(request: &GenerationRequest) -> (String, GenerationConfig) {
    let mut prompt = String::with_capacity(TEMPLATE.len() + request.content.len() + 1);
    prompt.push_str(TEMPLATE);
    prompt.push_str(&request.content);
    prompt.push('\n');

    let config = GenerationConfig {
        thinking_config: request.thinking_enabled.then_some(ThinkingConfig {
            thinking_budget: THINKING_BUDGET,
        }),
    };

    (prompt, config)
}
