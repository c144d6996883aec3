use sphinx_db::Entity;

#[derive(Debug, Clone, Entity)]
#[orm(table = "users")]
pub struct User {
	#[orm(primary_key, auto_increment)]
	pub id: u64,
	pub firstname: String,
	pub lastname: String,
	pub username: String,
	pub student_id: Option<String>,
	pub email: String,
	pub role: String,
}

#[derive(Debug, Clone, Entity)]
#[orm(table = "courses")]
pub struct Course {
	#[orm(primary_key, auto_increment)]
	pub id: u64,
	pub title: String,
	pub description: Option<String>,
	#[orm(foreign_key = "User::id", optional)]
	pub owner_id: Option<u64>,
	#[orm(link_many = "course_id")]
	pub modules: Option<Vec<Module>>,
}

#[derive(Debug, Clone, Entity)]
#[orm(table = "modules")]
pub struct Module {
	#[orm(primary_key, auto_increment)]
	pub id: u64,
	#[orm(foreign_key = "Course::id")]
	pub course_id: Option<u64>,
	pub title: String,
	pub description: Option<String>,
}
