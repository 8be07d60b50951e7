//! Built-in system prompts and the keyword routing that picks between them.

pub const DEFAULT_SYSTEM_PROMPT: &str = "당신은 친절하고 도움이 되는 AI 대화 상대입니다. \
사용자의 질문에 정확하고 이해하기 쉽게 답하고, 모르는 것은 모른다고 솔직하게 말하세요. \
대화의 맥락을 기억하고 자연스럽게 이어가세요.";

pub const CHILD_FRIENDLY_SYSTEM_PROMPT: &str = "당신은 어린이와 대화하는 다정한 친구입니다. \
쉬운 단어와 짧은 문장을 사용하고, 항상 긍정적이고 안전한 내용만 이야기하세요. \
어려운 주제는 아이의 눈높이에 맞게 설명하세요.";

pub const EDUCATIONAL_SYSTEM_PROMPT: &str = "당신은 인내심 있는 선생님입니다. \
개념을 단계별로 설명하고, 예시를 들어 이해를 돕고, 학습자가 스스로 생각할 수 있도록 질문을 던지세요. \
틀린 답에는 부드럽게 바로잡아 주세요.";

pub const PROFESSIONAL_SYSTEM_PROMPT: &str = "당신은 경험 많은 전문 컨설턴트입니다. \
정확하고 구조화된 답변을 제공하고, 근거와 함께 실행 가능한 조언을 하세요. \
전문 용어는 필요할 때만 사용하고 명확하게 설명하세요.";

pub const SAFETY_GUIDELINES: &str = "다음 안전 지침을 항상 따르세요: \
1) 선정적이거나 유해한 콘텐츠는 제공하지 마세요. \
2) 불법적인 활동을 도울 수 있는 정보는 제공하지 마세요. \
3) 개인정보 보호를 중요시하세요. \
4) 응답은 간결하고 명확하게 유지하세요.";

const EDUCATIONAL_KEYWORDS: &[&str] = &["교육", "교사", "학습", "education", "teacher", "tutor", "learning"];
const PROFESSIONAL_KEYWORDS: &[&str] = &["비즈니스", "전문가", "컨설턴트", "business", "expert", "consultant"];
const CHILD_FRIENDLY_KEYWORDS: &[&str] = &["어린이", "아동", "친구", "child", "kid", "friend"];

/// The name prefix placed in front of the first persona system message.
pub fn name_prefix(contact_name: &str) -> String {
    format!("당신은 {} 입니다. ", contact_name)
}

/// Pick a built-in prompt by case-insensitive keyword match on a persona
/// description. Educational beats professional beats child-friendly.
pub fn default_prompt_for(description: Option<&str>) -> &'static str {
    let Some(description) = description else {
        return DEFAULT_SYSTEM_PROMPT;
    };
    let description = description.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| description.contains(k));

    if matches(EDUCATIONAL_KEYWORDS) {
        EDUCATIONAL_SYSTEM_PROMPT
    } else if matches(PROFESSIONAL_KEYWORDS) {
        PROFESSIONAL_SYSTEM_PROMPT
    } else if matches(CHILD_FRIENDLY_KEYWORDS) {
        CHILD_FRIENDLY_SYSTEM_PROMPT
    } else {
        DEFAULT_SYSTEM_PROMPT
    }
}
