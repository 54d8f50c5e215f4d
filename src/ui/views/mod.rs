mod conversations;
mod detail;
mod questions;
mod resource_list;
mod sales;
mod thread;

pub use conversations::ConversationListView;
pub use detail::DetailView;
pub use questions::QuestionListView;
pub use resource_list::ResourceListView;
pub use sales::SalesView;
pub use thread::ThreadView;
