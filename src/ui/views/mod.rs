mod departments;
mod login;
mod notifications;
mod objective_detail;
mod objective_list;
mod ratings;
mod task_detail;
mod users;

pub use departments::DepartmentsView;
pub use login::LoginView;
pub use notifications::NotificationsView;
pub use objective_detail::ObjectiveDetailView;
pub use objective_list::ObjectiveListView;
pub use ratings::RatingsView;
pub use task_detail::TaskDetailView;
pub use users::UsersView;
