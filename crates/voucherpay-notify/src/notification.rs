//! Inbound provider notification payload.

/// Command prepended to the payload when echoing it back for verification.
pub const VERIFY_COMMAND: (&str, &str) = ("cmd", "_notify-validate");

/// Field naming the payment recipient.
pub const FIELD_RECEIVER: &str = "receiver_email";
/// Field carrying the payment status (`Completed`, `Pending`, ...).
pub const FIELD_PAYMENT_STATUS: &str = "payment_status";
/// Field carrying the payer verification status.
pub const FIELD_PAYER_STATUS: &str = "payer_status";
/// Field carrying the payer address status.
pub const FIELD_ADDRESS_STATUS: &str = "address_status";
/// Field carrying the voucher code.
pub const FIELD_VOUCHER: &str = "item_number";
/// Field carrying the rate plan id.
pub const FIELD_PLAN: &str = "item_name";
/// Field carrying the gross amount paid.
pub const FIELD_GROSS: &str = "mc_gross";
/// Provider transaction id, used for logging only.
pub const FIELD_TXN_ID: &str = "txn_id";

/// A form-encoded notification.
///
/// The body is kept exactly as received for the echo-back; the decoded
/// fields only serve the accessors. Values are decoded as UTF-8 (lossily),
/// so they must never be re-encoded to rebuild the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    raw: Vec<u8>,
    fields: Vec<(String, String)>,
}

impl Notification {
    /// Build a notification from decoded fields, encoding them as the body.
    pub fn new(fields: Vec<(String, String)>) -> Self {
        let raw = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields.iter())
            .finish()
            .into_bytes();
        Self { raw, fields }
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_form_body(body: &[u8]) -> Self {
        let fields = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self {
            raw: body.to_vec(),
            fields,
        }
    }

    /// First value of a field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn receiver(&self) -> Option<&str> {
        self.get(FIELD_RECEIVER)
    }

    pub fn payment_status(&self) -> Option<&str> {
        self.get(FIELD_PAYMENT_STATUS)
    }

    pub fn voucher(&self) -> Option<&str> {
        self.get(FIELD_VOUCHER)
    }

    pub fn plan(&self) -> Option<&str> {
        self.get(FIELD_PLAN)
    }

    pub fn gross(&self) -> Option<&str> {
        self.get(FIELD_GROSS)
    }

    pub fn txn_id(&self) -> Option<&str> {
        self.get(FIELD_TXN_ID)
    }

    /// Whether the provider flagged the payer as unverified.
    pub fn payer_unverified(&self) -> bool {
        self.get(FIELD_PAYER_STATUS)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("unverified"))
    }

    /// Whether the provider flagged the payer's address as unconfirmed.
    pub fn address_unconfirmed(&self) -> bool {
        self.get(FIELD_ADDRESS_STATUS)
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("unconfirmed"))
    }

    /// Whether the payment status is `Completed`.
    pub fn is_completed(&self) -> bool {
        self.payment_status()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case("Completed"))
    }

    /// The body as received.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Body of the echo-back request: the verify command followed by the
    /// received body, byte for byte.
    pub fn echo_body(&self) -> Vec<u8> {
        let mut body = format!("{}={}", VERIFY_COMMAND.0, VERIFY_COMMAND.1).into_bytes();
        if !self.raw.is_empty() {
            body.push(b'&');
            body.extend_from_slice(&self.raw);
        }
        body
    }
}
