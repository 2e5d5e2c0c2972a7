use dojoform::form::{CheckFailure, FieldKey, JsonTransport};
use dojoform::prelude::*;
use futures::executor::{ThreadPool, block_on};
use futures::future::BoxFuture;
use serde_json::{Value, json};

const EMAIL: FieldKey = FieldKey::new("email");
const PASSWORD: FieldKey = FieldKey::new("password");

fn login_form(locale: &str) -> FormEngine {
    let engine = FormEngine::with_options(
        [
            (EMAIL, FieldValue::from("")),
            (PASSWORD, FieldValue::from("")),
        ],
        ThreadPool::new().expect("thread pool must start"),
        FormOptions {
            debounce_ms: 10,
            locale: Locale::from(locale),
            ..FormOptions::default()
        },
    );
    engine
        .set_schema([
            (EMAIL, vec![factory::required(), factory::email()]),
            (
                PASSWORD,
                vec![
                    factory::required(),
                    factory::password_strength(PasswordStrength::Medium),
                ],
            ),
        ])
        .expect("login schema");
    engine
}

#[test]
fn login_form_reports_localized_errors() {
    let engine = login_form("ru");

    engine.set_field_value(EMAIL, "bad").expect("type email");
    engine.touch_field(EMAIL).expect("blur email");
    block_on(engine.settle()).expect("settle");

    assert_eq!(
        engine.get_field_error(EMAIL).expect("email error"),
        Some("Неверный email адрес".to_string())
    );
    assert_eq!(
        engine.display_error(EMAIL).expect("email display"),
        Some("Неверный email адрес".to_string())
    );
    assert!(!engine.is_valid().expect("form validity"));
    assert_eq!(engine.display_error(PASSWORD).expect("password display"), None);
}

#[test]
fn login_form_submits_once_valid() {
    let engine = login_form("en");
    engine.set_field_value(EMAIL, "sensei@dojo.ru").expect("email");
    engine.set_field_value(PASSWORD, "weak").expect("password");
    block_on(engine.settle()).expect("settle");
    assert_eq!(
        engine.get_field_error(PASSWORD).expect("password error"),
        Some(
            "Password must be at least 8 characters long and contain upper- and lowercase \
             letters and digits"
                .to_string()
        )
    );

    engine.set_field_value(PASSWORD, "Kihon2024").expect("password");
    let mut submitted = None;
    block_on(engine.submit_async(|values| {
        submitted = Some(values);
        async { Ok(()) }
    }))
    .expect("submit");

    let submitted = submitted.expect("handler received values");
    assert_eq!(submitted[&PASSWORD], FieldValue::from("Kihon2024"));
    assert_eq!(engine.submit_state().expect("state"), SubmitState::Succeeded);

    engine.reset().expect("reset");
    assert_eq!(engine.submit_state().expect("state"), SubmitState::Idle);
    assert_eq!(engine.get_field_value(PASSWORD).expect("password"), FieldValue::from(""));
}

struct TakenEmails;

impl JsonTransport for TakenEmails {
    fn post(&self, path: &str, body: Value) -> BoxFuture<'static, Result<Value, CheckFailure>> {
        let taken = path == dojoform::form::CHECK_EMAIL_PATH
            && body.get("email").and_then(Value::as_str) == Some("taken@dojo.ru");
        Box::pin(async move { Ok(json!({ "exists": taken })) })
    }
}

#[test]
fn registration_rejects_taken_email() {
    let engine = login_form("en");
    engine
        .set_field_rules(
            EMAIL,
            vec![
                factory::required(),
                factory::email(),
                factory::email_unique(dojoform::form::CheckEndpoint::email(TakenEmails)),
            ],
        )
        .expect("registration rules");

    block_on(engine.set_field_value_async(EMAIL, "taken@dojo.ru")).expect("taken email");
    assert_eq!(
        engine.get_field_error(EMAIL).expect("email error"),
        Some("Email is already in use".to_string())
    );

    block_on(engine.set_field_value_async(EMAIL, "free@dojo.ru")).expect("free email");
    assert_eq!(engine.get_field_error(EMAIL).expect("email error"), None);
}
