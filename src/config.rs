//! Construction-time configuration. A small builder struct consumed once by
//! `EventBus::with_config`, in the shape engine-core/audio-system settings
//! structs use elsewhere in this codebase.

#[derive(Debug, Clone)]
pub struct BusConfig {
    pub(crate) event_inheritance: bool,
    pub(crate) log_subscriber_exceptions: bool,
    pub(crate) log_no_subscriber_messages: bool,
    pub(crate) send_subscriber_exception_event: bool,
    pub(crate) send_no_subscriber_event: bool,
    pub(crate) throw_subscriber_exception: bool,
    pub(crate) strict_method_verification: bool,
    pub(crate) ignore_generated_index: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            event_inheritance: true,
            log_subscriber_exceptions: true,
            log_no_subscriber_messages: true,
            send_subscriber_exception_event: true,
            send_no_subscriber_event: true,
            throw_subscriber_exception: false,
            strict_method_verification: false,
            ignore_generated_index: false,
        }
    }
}

impl BusConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_inheritance(mut self, value: bool) -> Self {
        self.event_inheritance = value;
        self
    }

    pub fn log_subscriber_exceptions(mut self, value: bool) -> Self {
        self.log_subscriber_exceptions = value;
        self
    }

    pub fn log_no_subscriber_messages(mut self, value: bool) -> Self {
        self.log_no_subscriber_messages = value;
        self
    }

    pub fn send_subscriber_exception_event(mut self, value: bool) -> Self {
        self.send_subscriber_exception_event = value;
        self
    }

    pub fn send_no_subscriber_event(mut self, value: bool) -> Self {
        self.send_no_subscriber_event = value;
        self
    }

    pub fn throw_subscriber_exception(mut self, value: bool) -> Self {
        self.throw_subscriber_exception = value;
        self
    }

    pub fn strict_method_verification(mut self, value: bool) -> Self {
        self.strict_method_verification = value;
        self
    }

    pub fn ignore_generated_index(mut self, value: bool) -> Self {
        self.ignore_generated_index = value;
        self
    }
}
