// Parameter Binder - maps one message onto the handler's argument list

use crate::domain::{
    AttributeType, AttributeValue, Binding, Message, MessageAttribute, ParameterRole, PayloadKind,
    Session,
};
use crate::port::codec::{Codec, CodecError};
use crate::port::handler::{Argument, Arguments, PayloadArg};
use tracing::error;

/// Error code recorded in the session when payload decoding fails
const DECODE_ERROR_CODE: i32 = 500;

/// Bind a message to the binding's declared parameter positions, in order.
///
/// A payload decode failure is recovered into the session's error fields when
/// the binding declares a session position (the handler still runs and can
/// inspect them); without one it propagates and the message is left for
/// redelivery. Extracts the transaction attribute into the session as a side
/// effect.
pub fn bind(
    binding: &Binding,
    message: &Message,
    session: &mut Session,
    codec: &dyn Codec,
) -> Result<Arguments, CodecError> {
    let mut args = Vec::with_capacity(binding.parameters.len());
    for role in &binding.parameters {
        match role {
            ParameterRole::Session => args.push(Argument::Session),
            ParameterRole::Payload => {
                args.push(Argument::Payload(bind_payload(binding, message, session, codec)?))
            }
            ParameterRole::Attribute(name) => args.push(Argument::Attribute(
                message
                    .attributes
                    .get(name)
                    .and_then(|a| a.string_value.clone()),
            )),
        }
    }

    if let Some(name) = &binding.transaction_attribute {
        if let Some(attr) = message.attributes.get(name) {
            session
                .attributes
                .insert(name.clone(), coerce_attribute(attr));
        }
        // absent: intentionally no entry, no default
    }

    Ok(Arguments::new(args))
}

fn bind_payload(
    binding: &Binding,
    message: &Message,
    session: &mut Session,
    codec: &dyn Codec,
) -> Result<PayloadArg, CodecError> {
    match binding.payload_kind {
        PayloadKind::Raw => Ok(PayloadArg::Raw(message.clone())),
        PayloadKind::Text => Ok(PayloadArg::Text(message.body.clone())),
        PayloadKind::Decoded => match codec.decode(&message.body) {
            Ok(value) => Ok(PayloadArg::Decoded(value)),
            Err(e) if binding.has_session() => {
                session.error = true;
                session.error_code = DECODE_ERROR_CODE;
                session.error_description = Some(e.to_string());
                error!(
                    message_id = %message.id,
                    error = %e,
                    "error decoding payload"
                );
                Ok(PayloadArg::Absent)
            }
            Err(e) => Err(e),
        },
    }
}

/// Coerce a wire attribute by its reported type into the closed value set.
/// Numbers parse as float when the text carries a decimal point, integer
/// otherwise, and fall back to raw text when unparsable.
pub fn coerce_attribute(attr: &MessageAttribute) -> AttributeValue {
    match attr.data_type {
        AttributeType::String => {
            AttributeValue::Text(attr.string_value.clone().unwrap_or_default())
        }
        AttributeType::Number => {
            let text = attr.string_value.clone().unwrap_or_default();
            if text.contains('.') {
                match text.parse::<f64>() {
                    Ok(x) => AttributeValue::Float(x),
                    Err(_) => AttributeValue::Text(text),
                }
            } else {
                match text.parse::<i64>() {
                    Ok(i) => AttributeValue::Integer(i),
                    Err(_) => AttributeValue::Text(text),
                }
            }
        }
        AttributeType::Binary => {
            AttributeValue::Bytes(attr.binary_value.clone().unwrap_or_default())
        }
    }
}
