mod listings_tests;
mod moderation_tests;
mod operations_tests;
mod submission_tests;
