pub mod pos_dto;
