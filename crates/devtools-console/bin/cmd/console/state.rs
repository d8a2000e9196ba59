use devtools_console::{PresentedMessage, PresentedRow};

/// Represents which UI component has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Focus {
    Console,
    Inspect,
}

/// A selectable line of the console panel
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConsoleLine<'a> {
    pub(crate) message: &'a PresentedMessage,
    pub(crate) row: &'a PresentedRow,
    /// First row of its message, where the icon is drawn
    pub(crate) first: bool,
}

pub(crate) fn console_lines(messages: &[PresentedMessage]) -> Vec<ConsoleLine<'_>> {
    messages
        .iter()
        .flat_map(|message| {
            message
                .rows
                .iter()
                .enumerate()
                .map(move |(i, row)| ConsoleLine {
                    message,
                    row,
                    first: i == 0,
                })
        })
        .collect()
}
