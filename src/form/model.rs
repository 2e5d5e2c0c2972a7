use super::controller::{FieldKey, FormError, FormResult};
use super::value::{FieldValue, FormValues, FromFieldValue};

/// A struct whose fields make up a form. Implemented by `#[derive(FormModel)]`.
pub trait FormModel: Sized {
    type Fields;

    fn fields() -> Self::Fields;
    fn field_keys() -> &'static [FieldKey];
    fn into_values(self) -> FormValues;
    fn from_values(values: &FormValues) -> FormResult<Self>;
}

#[doc(hidden)]
pub fn read_field<V>(values: &FormValues, key: FieldKey) -> FormResult<V>
where
    V: FromFieldValue,
{
    let value = values.get(&key).ok_or(FormError::UnknownField(key))?;
    V::from_field_value(value).ok_or(FormError::FieldType {
        field: key,
        expected: std::any::type_name::<V>(),
    })
}

#[doc(hidden)]
pub fn write_field<V>(values: &mut FormValues, key: FieldKey, value: V)
where
    V: Into<FieldValue>,
{
    values.insert(key, value.into());
}
