pub mod querybench;
