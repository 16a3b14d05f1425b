pub const INDEX_HTML: &str = include_str!("../frontend/index.html");
pub const TODOS_HTML: &str = include_str!("../frontend/todos.html");
