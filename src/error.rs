//! Error types
//!
//! Errors for the fallible, non-hot-path operations: packet construction and
//! subscriber management. Delivery never returns an error; it returns a
//! [`DeliveryStatus`](crate::graph::DeliveryStatus).

/// Error type for media graph operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Payload does not fit into a packet buffer
    PayloadTooLarge {
        /// Requested payload length
        length: usize,
        /// Buffer capacity
        capacity: usize,
    },
    /// A subscriber with this id is already registered
    SubscriberExists(String),
    /// No subscriber with this id
    SubscriberNotFound(String),
    /// The relay already serves its maximum number of subscribers
    SubscriberLimit(usize),
    /// The relay has been closed
    RelayClosed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PayloadTooLarge { length, capacity } => {
                write!(f, "Payload too large: {} bytes (capacity {})", length, capacity)
            }
            Error::SubscriberExists(id) => write!(f, "Subscriber already exists: {}", id),
            Error::SubscriberNotFound(id) => write!(f, "Subscriber not found: {}", id),
            Error::SubscriberLimit(max) => write!(f, "Subscriber limit reached: {}", max),
            Error::RelayClosed => write!(f, "Relay closed"),
        }
    }
}

impl std::error::Error for Error {}

/// Result alias for crate operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = Error::PayloadTooLarge {
            length: 2000,
            capacity: 1500,
        };
        assert_eq!(err.to_string(), "Payload too large: 2000 bytes (capacity 1500)");

        let err = Error::SubscriberExists("alice".into());
        assert_eq!(err.to_string(), "Subscriber already exists: alice");

        let err = Error::SubscriberLimit(8);
        assert_eq!(err.to_string(), "Subscriber limit reached: 8");
    }
}
