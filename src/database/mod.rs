pub mod migration;
pub mod seeder;
