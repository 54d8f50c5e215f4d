mod command_input;
mod confirm;
mod input;
mod key_result;
mod prompt;
mod search_input;
mod table;
mod toast;

pub use command_input::{CommandEvent, CommandInput};
pub use confirm::{ConfirmDialog, ConfirmEvent};
pub use input::{InputResult, TextInput};
pub use key_result::KeyResult;
pub use prompt::{Prompt, PromptEvent};
pub use search_input::{SearchEvent, SearchInput};
pub use table::{CellRender, Column, DataTable, PageState, Paging, TableEvent, TableRow};
pub use toast::{Notice, NoticeKind, Toasts};
