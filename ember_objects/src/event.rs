//! The fixed event vocabulary of the object system.

pub const EVENT_COUNT: usize = 20;

/// Per-event generated function shape.
#[derive(Copy, Clone, Debug)]
pub struct EventSignature {
    pub name: &'static str,
    pub return_type: &'static str,
    pub return_value: &'static str,
    pub params: &'static str,
    pub caller_args: &'static str,
}

/// Indexed by the event's keyword id; the event keywords occupy the first
/// [`EVENT_COUNT`] keyword slots.
pub const EVENT_FUNCTIONS: [EventSignature; EVENT_COUNT] = [
    EventSignature { name: "event_create", return_type: "void", return_value: "", params: "()", caller_args: "()" },
    EventSignature { name: "event_destroy", return_type: "void", return_value: "", params: "()", caller_args: "()" },
    EventSignature { name: "event_initialize", return_type: "void", return_value: "", params: "()", caller_args: "()" },
    EventSignature { name: "event_frame_start", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_frame_end", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_update_custom", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_update_gui", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_update", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_render_custom", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_render_gui", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_render", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_custom", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_prepare", return_type: "void", return_value: "", params: "()", caller_args: "()" },
    EventSignature { name: "event_test", return_type: "bool", return_value: "", params: "()", caller_args: "()" },
    EventSignature { name: "event_sleep", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_wake", return_type: "void", return_value: "", params: "( const Delta delta )", caller_args: "( delta )" },
    EventSignature { name: "event_flag", return_type: "void", return_value: "", params: "( const u64 code )", caller_args: "( code )" },
    EventSignature { name: "event_partition", return_type: "void", return_value: "", params: "( void *ptr )", caller_args: "( ptr )" },
    EventSignature { name: "event_network_send", return_type: "bool", return_value: "", params: "( Buffer &buffer )", caller_args: "( buffer )" },
    EventSignature { name: "event_network_receive", return_type: "bool", return_value: "", params: "( Buffer &buffer )", caller_args: "( buffer )" },
];

/// Per-object, per-event parse state.
#[derive(Clone, Debug, Default)]
pub struct Event {
    /// This object (or an ancestor) provides the event.
    pub inherits: bool,
    /// This object's file has a body for the event.
    pub implements: bool,
    /// Excluded from the generated per-frame dispatch loops.
    pub manual: bool,
    /// The generated body does not call the parent's event.
    pub noinherit: bool,
    /// `DISABLE`d: an empty private stub blocks inheritance entirely.
    pub disabled: bool,
    pub source: String,
    pub header: String,
    pub null: String,
}
