use dojoform::form::{FieldValue, FormModel};

#[derive(Clone, dojoform::form::FormModel)]
struct TrialForm {
    email: String,
    age: Option<u32>,
}

fn main() {
    let fields = TrialForm::fields();
    assert_eq!(fields.email().as_str(), "email");
    assert_eq!(TrialForm::field_keys().len(), 2);

    let values = TrialForm {
        email: "a@dojo.ru".to_string(),
        age: None,
    }
    .into_values();
    assert_eq!(values[&fields.age()], FieldValue::Null);

    let model = TrialForm::from_values(&values).expect("model reads back");
    assert_eq!(model.email, "a@dojo.ru");
}
