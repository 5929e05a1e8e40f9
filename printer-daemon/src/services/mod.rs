pub mod test_page;
