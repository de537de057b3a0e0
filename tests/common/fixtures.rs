use std::sync::Mutex;

use recorder_companion::CompanionError;
use recorder_companion::recording::event_model::RecordedEvent;
use recorder_companion::suggest::ai_model::TextInference;

/// A small sign-up page: two visible text inputs, one hidden, one textarea,
/// one name-only field and a submit button.
pub const SIGNUP_PAGE: &str = r#"<!DOCTYPE html><html><head><title>Sign up</title></head><body><form id="signup"><label>Email</label><input id="email" type="email"><label>Age</label><input id="age" type="number"><input id="token" type="text" style="display: none"><input name="nickname"><textarea id="bio"></textarea><input type="submit" id="go"></form></body></html>"#;

/// The recording of a user filling in the sign-up page.
pub fn signup_events() -> Vec<RecordedEvent> {
    vec![
        RecordedEvent::new("pageload").at(1_000).with_url("http://shop.test:8080/signup"),
        RecordedEvent::new("click").at(1_500).with_tag("INPUT").with_id("email"),
        RecordedEvent::new("change")
            .at(2_000)
            .with_tag("INPUT")
            .with_id("email")
            .with_value("a@b.test"),
        RecordedEvent::new("change")
            .at(2_400)
            .with_tag("INPUT")
            .with_id("age")
            .with_value("30"),
        RecordedEvent::new("submit").at(2_600).with_tag("FORM").with_id("signup"),
    ]
}

/// Answers each suggestion prompt with a record for the field it names,
/// and remembers every user prompt it saw.
pub struct ScriptedInference {
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl TextInference for ScriptedInference {
    fn infer(&self, _system: &str, user: &str) -> Result<String, CompanionError> {
        self.prompts.lock().unwrap().push(user.to_string());

        let key = field_named_in(user).unwrap_or(("id".to_string(), String::new()));

        if key.1 == "broken" {
            return Ok("sorry, I cannot help with that".to_string());
        }
        if key.1 == "offline" {
            return Err(CompanionError::ModelStatus {
                endpoint: "scripted".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }

        let record = match key.0.as_str() {
            "id" => format!(
                r#"{{"id":"{v}","type":"text","range":"anything for {v}","examples":["{v}-1","{v}-2"],"bad_examples":[""]}}"#,
                v = key.1
            ),
            _ => format!(
                r#"{{"name":"{v}","type":"text","range":"anything for {v}","examples":["{v}-1"],"bad_examples":[]}}"#,
                v = key.1
            ),
        };
        Ok(format!("Here you go:\n```json\n[{}]\n```", record))
    }
}

/// `(attribute, value)` from the prompt's `Field: <...> with id="x"` line.
fn field_named_in(user: &str) -> Option<(String, String)> {
    let line = user.lines().next()?;
    let rest = &line[line.find(" with ")? + " with ".len()..];
    let (attr, quoted) = rest.split_once('=')?;
    Some((attr.to_string(), quoted.trim_matches('"').to_string()))
}
