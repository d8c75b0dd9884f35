pub mod tracker_view;
