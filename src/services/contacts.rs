use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MODEL;
use crate::models::{AdvancedSettings, Contact, Persona, SystemPrompt};
use crate::providers::catalog;
use crate::services::ids::generate_id;

/// Fields for a new contact; id and status fields are assigned on creation.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub model_id: Option<String>,
    pub avatar: Option<String>,
    pub background_image: Option<String>,
    pub persona: Persona,
}

/// Partial edit; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub model_id: Option<String>,
    pub avatar: Option<String>,
    pub background_image: Option<String>,
    pub persona: Option<Persona>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactStore {
    contacts: Vec<Contact>,
    selected_contact_id: Option<String>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(contacts: Vec<Contact>, selected_contact_id: Option<String>) -> Self {
        Self {
            contacts,
            selected_contact_id,
        }
    }

    pub fn list(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn get(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    pub fn selected_contact_id(&self) -> Option<&str> {
        self.selected_contact_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Add a contact and make it the selected one.
    pub fn create_contact(&mut self, new: NewContact) -> &Contact {
        let contact = Contact {
            id: generate_id(),
            name: new.name,
            model_id: new.model_id.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            avatar: new.avatar,
            background_image: new.background_image,
            persona: new.persona,
            last_active: Utc::now(),
            is_online: false,
            unread_count: 0,
        };
        tracing::debug!("Created contact {} ({})", contact.name, contact.id);

        self.selected_contact_id = Some(contact.id.clone());
        self.contacts.push(contact);
        &self.contacts[self.contacts.len() - 1]
    }

    pub fn select_contact(&mut self, id: &str) {
        self.selected_contact_id = Some(id.to_string());
        if let Some(contact) = self.get_mut(id) {
            contact.unread_count = 0;
        }
    }

    pub fn update_contact(&mut self, id: &str, update: ContactUpdate) {
        let Some(contact) = self.get_mut(id) else {
            return;
        };
        if let Some(name) = update.name {
            contact.name = name;
        }
        if let Some(model_id) = update.model_id {
            contact.model_id = model_id;
        }
        if let Some(avatar) = update.avatar {
            contact.avatar = Some(avatar);
        }
        if let Some(background_image) = update.background_image {
            contact.background_image = Some(background_image);
        }
        if let Some(persona) = update.persona {
            contact.persona = persona;
        }
    }

    pub fn delete_contact(&mut self, id: &str) {
        self.contacts.retain(|c| c.id != id);
        if self.selected_contact_id.as_deref() == Some(id) {
            self.selected_contact_id = self.contacts.first().map(|c| c.id.clone());
        }
    }

    pub fn set_online_status(&mut self, id: &str, is_online: bool) {
        if let Some(contact) = self.get_mut(id) {
            contact.is_online = is_online;
            if is_online {
                contact.last_active = Utc::now();
            }
        }
    }

    pub fn increment_unread(&mut self, id: &str) {
        if let Some(contact) = self.get_mut(id) {
            contact.unread_count += 1;
        }
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Contact> {
        self.contacts.iter_mut().find(|c| c.id == id)
    }
}

/// Starter contacts offered on first launch.
pub fn sample_contacts() -> Vec<NewContact> {
    vec![
        sample(
            "김민준",
            "anthropic/claude-3-7-sonnet-latest",
            "철학적 사고를 가진 멘토",
            "당신은 철학적 사고와 깊은 통찰력을 가진 멘토입니다. \
             다양한 철학적 관점을 제시하고, 소크라테스식 대화법으로 \
             사용자가 스스로 답을 찾도록 도와주세요.",
            (0.7, 0.9),
        ),
        sample(
            "이서연",
            "openai/chatgpt-4o-latest",
            "창의적인 작가 친구",
            "당신은 창의적인 작가이자 사용자의 친구입니다. \
             사용자의 아이디어에 영감을 주고 함께 이야기를 발전시키세요.",
            (0.9, 0.95),
        ),
        sample(
            "박지훈",
            "xai/grok-3-mini-beta:high",
            "유머러스한 코미디언",
            "당신은 재치 있고 유머러스한 코미디언입니다. \
             존중과 배려를 바탕으로 사용자를 웃게 만드세요.",
            (0.95, 0.98),
        ),
        sample(
            "최수아",
            "google/gemini-2.5-flash-preview-04-17",
            "심리 상담사",
            "당신은 공감 능력이 뛰어난 심리 상담사입니다. \
             비판단적인 태도로 경청하고 반영적 경청 기술을 사용하세요. \
             전문적인 심리 치료를 제공하는 것은 아님을 명심하세요.",
            (0.6, 0.8),
        ),
        sample(
            "정도윤",
            "anthropic/claude-3-opus-20240229",
            "과학 교육자",
            "당신은 열정적인 과학 교육자입니다. \
             복잡한 과학적 개념을 쉽고 재미있게 설명하고, \
             과학적 정확성을 유지하면서도 접근하기 쉬운 언어를 사용하세요.",
            (0.5, 0.7),
        ),
        sample(
            "김지연",
            "anthropic/claude-3-7-sonnet-latest",
            "오랜 친구",
            "당신은 사용자의 오랜 친구입니다. \
             중학교 때부터 함께 자라온 소울메이트로, 친근하고 편안한 \
             대화 스타일을 유지하며 가끔은 장난스럽게 놀리기도 합니다.",
            (0.8, 0.9),
        ),
        sample(
            "이민지",
            "anthropic/claude-3-haiku-20240307",
            "직장 동료",
            "당신은 사용자의 직장 동료입니다. \
             같은 팀에서 2년째 함께 일하고 있으며, 업무 관련 대화와 \
             사적인 대화의 균형을 잘 유지하세요.",
            (0.7, 0.8),
        ),
    ]
}

fn sample(
    name: &str,
    model_id: &str,
    description: &str,
    prompt: &str,
    (temperature, top_p): (f32, f32),
) -> NewContact {
    NewContact {
        name: name.to_string(),
        model_id: Some(model_id.to_string()),
        avatar: None,
        background_image: None,
        persona: Persona {
            description: description.to_string(),
            system_prompt: SystemPrompt::system(prompt),
            advanced_settings: Some(AdvancedSettings {
                temperature,
                top_k: None,
                top_p: Some(top_p),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_contact(name: &str) -> NewContact {
        NewContact {
            name: name.to_string(),
            model_id: None,
            avatar: None,
            background_image: None,
            persona: Persona {
                description: String::new(),
                system_prompt: SystemPrompt::text("Be kind"),
                advanced_settings: None,
            },
        }
    }

    #[test]
    fn test_create_selects_and_defaults() {
        let mut store = ContactStore::new();
        let id = store.create_contact(new_contact("Alex")).id.clone();

        let contact = store.get(&id).unwrap();
        assert_eq!(contact.model_id, DEFAULT_MODEL);
        assert!(!contact.is_online);
        assert_eq!(contact.unread_count, 0);
        assert_eq!(store.selected_contact_id(), Some(id.as_str()));
    }

    #[test]
    fn test_select_resets_unread() {
        let mut store = ContactStore::new();
        let id = store.create_contact(new_contact("Alex")).id.clone();
        store.increment_unread(&id);
        store.increment_unread(&id);
        assert_eq!(store.get(&id).unwrap().unread_count, 2);

        store.select_contact(&id);
        assert_eq!(store.get(&id).unwrap().unread_count, 0);
    }

    #[test]
    fn test_partial_update() {
        let mut store = ContactStore::new();
        let id = store.create_contact(new_contact("Alex")).id.clone();
        store.update_contact(
            &id,
            ContactUpdate {
                name: Some("Sam".to_string()),
                ..ContactUpdate::default()
            },
        );

        let contact = store.get(&id).unwrap();
        assert_eq!(contact.name, "Sam");
        assert_eq!(contact.persona.system_prompt, SystemPrompt::text("Be kind"));
    }

    #[test]
    fn test_delete_falls_back_to_first() {
        let mut store = ContactStore::new();
        let first = store.create_contact(new_contact("A")).id.clone();
        let second = store.create_contact(new_contact("B")).id.clone();
        assert_eq!(store.selected_contact_id(), Some(second.as_str()));

        store.delete_contact(&second);
        assert_eq!(store.selected_contact_id(), Some(first.as_str()));

        store.delete_contact(&first);
        assert!(store.selected_contact_id().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_online_bumps_last_active() {
        let mut store = ContactStore::new();
        let id = store.create_contact(new_contact("A")).id.clone();
        let before = store.get(&id).unwrap().last_active;

        store.set_online_status(&id, true);
        let contact = store.get(&id).unwrap();
        assert!(contact.is_online);
        assert!(contact.last_active >= before);

        store.set_online_status(&id, false);
        assert!(!store.get(&id).unwrap().is_online);
    }

    #[test]
    fn test_sample_contacts_have_personas() {
        let samples = sample_contacts();
        assert_eq!(samples.len(), 7);
        assert!(samples.iter().all(|c| !c.persona.system_prompt.is_blank()));
    }

    #[test]
    fn test_sample_contacts_use_system_messages() {
        for contact in sample_contacts() {
            assert!(matches!(contact.persona.system_prompt, SystemPrompt::Single(_)));
            let model = contact.model_id.unwrap_or_default();
            assert!(catalog::is_known_model(&model), "{} uses {}", contact.name, model);
        }
    }
}
