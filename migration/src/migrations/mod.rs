pub mod m202606100001_create_users;
pub mod m202606100002_create_student_states;
