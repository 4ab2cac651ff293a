//! Sliding window over a message history
//!
//! Keeps the first message (it usually carries the task) plus the most
//! recent ones, so the amount of history handed to a renderer stays bounded.

/// Default number of messages kept by [`recent_window`]
pub const DEFAULT_WINDOW_SIZE: usize = 150;

/// Return at most `cap` messages: the first one plus the `cap - 1` newest
pub fn recent_window<T: Clone>(messages: &[T], cap: usize) -> Vec<T> {
    if messages.len() <= cap {
        return messages.to_vec();
    }
    if cap == 0 {
        return Vec::new();
    }

    let mut window = Vec::with_capacity(cap);
    window.push(messages[0].clone());
    window.extend_from_slice(&messages[messages.len() - (cap - 1)..]);
    window
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("Message {}", i)).collect()
    }

    #[test]
    fn test_under_cap_returns_all() {
        let input = messages(100);
        assert_eq!(recent_window(&input, DEFAULT_WINDOW_SIZE), input);
        assert!(recent_window::<String>(&[], DEFAULT_WINDOW_SIZE).is_empty());
        assert_eq!(recent_window(&messages(150), DEFAULT_WINDOW_SIZE).len(), 150);
    }

    #[test]
    fn test_keeps_first_and_newest() {
        let input = messages(200);
        let window = recent_window(&input, DEFAULT_WINDOW_SIZE);

        assert_eq!(window.len(), 150);
        assert_eq!(window[0], "Message 0");
        for i in 1..150 {
            assert_eq!(window[i], input[200 - 149 + (i - 1)]);
        }
        assert_eq!(window[149], "Message 199");
    }

    #[test]
    fn test_boundary_151() {
        let window = recent_window(&messages(151), DEFAULT_WINDOW_SIZE);
        assert_eq!(window.len(), 150);
        assert_eq!(window[0], "Message 0");
        assert_eq!(window[1], "Message 2");
        assert_eq!(window[149], "Message 150");
    }

    #[test]
    fn test_sizes() {
        for (input, expected) in [(0, 0), (1, 1), (149, 149), (150, 150), (151, 150), (500, 150)] {
            let window = recent_window(&messages(input), DEFAULT_WINDOW_SIZE);
            assert_eq!(window.len(), expected);
            if input > 150 {
                assert_eq!(window[0], "Message 0");
                assert_eq!(window[149], format!("Message {}", input - 1));
            }
        }
    }

    #[test]
    fn test_tiny_caps() {
        assert!(recent_window(&messages(3), 0).is_empty());
        assert_eq!(recent_window(&messages(3), 1), vec!["Message 0".to_string()]);
    }
}
